//! Resolves configured paths against the service root.
//!
//! Relative paths in configuration are interpreted relative to `root` so the
//! daemon behaves the same regardless of the directory an operator launches
//! it from. Resolution is purely lexical and never touches the filesystem.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Turns `path` into an absolute path anchored at `root`.
///
/// Absolute paths are returned unchanged. Relative paths are joined onto
/// `root` and normalised, collapsing `.` and `..` components.
///
/// # Examples
///
/// ```ignore
/// use camino::Utf8Path;
/// use mizuno_config::resolve_path;
///
/// let resolved = resolve_path(Utf8Path::new("/srv/app"), Utf8Path::new("log/out.log"));
/// assert_eq!(resolved, "/srv/app/log/out.log");
/// ```
pub fn resolve_path(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    normalise(&root.join(path))
}

/// Resolves an optional configured path, passing unset values through.
pub fn resolve_optional_path(root: &Utf8Path, path: Option<&str>) -> Option<Utf8PathBuf> {
    path.map(|value| resolve_path(root, Utf8Path::new(value)))
}

fn normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalised = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                normalised.push(component.as_str());
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                // `..` never climbs above the root directory.
                if normalised.parent().is_some() {
                    normalised.pop();
                }
            }
            Utf8Component::Normal(segment) => normalised.push(segment),
        }
    }
    normalised
}
