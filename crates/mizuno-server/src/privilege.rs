//! One-shot identity switch performed after the listener is bound.

use nix::errno::Errno;
use nix::unistd::{self, Gid, Group, Uid, User};
use thiserror::Error;
use tracing::info;

use mizuno_config::ServiceOptions;

use crate::SERVER_TARGET;

/// Operating-system identity calls used to drop privileges.
pub trait Identity {
    /// Looks up a user id by name.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by the user database.
    fn find_user(&self, name: &str) -> Result<Option<Uid>, Errno>;

    /// Looks up a group id by name.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by the group database.
    fn find_group(&self, name: &str) -> Result<Option<Gid>, Errno>;

    /// Switches the process user.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by `setuid`.
    fn switch_user(&self, uid: Uid) -> Result<(), Errno>;

    /// Switches the process group.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by `setgid`.
    fn switch_group(&self, gid: Gid) -> Result<(), Errno>;
}

/// Identity calls backed by `nix`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl Identity for SystemIdentity {
    fn find_user(&self, name: &str) -> Result<Option<Uid>, Errno> {
        User::from_name(name).map(|user| user.map(|user| user.uid))
    }

    fn find_group(&self, name: &str) -> Result<Option<Gid>, Errno> {
        Group::from_name(name).map(|group| group.map(|group| group.gid))
    }

    fn switch_user(&self, uid: Uid) -> Result<(), Errno> {
        unistd::setuid(uid)
    }

    fn switch_group(&self, gid: Gid) -> Result<(), Errno> {
        unistd::setgid(gid)
    }
}

/// Proof that the privilege drop has run.
///
/// The listener refuses to accept connections without one, so requests are
/// never served under the launching identity when a user or group is
/// configured.
#[derive(Debug)]
#[must_use]
pub struct DroppedPrivileges {
    user: Option<String>,
    group: Option<String>,
}

impl DroppedPrivileges {
    /// User the process switched to, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Group the process switched to, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    #[cfg(test)]
    pub(crate) const fn unchanged() -> Self {
        Self {
            user: None,
            group: None,
        }
    }
}

/// Errors raised while switching identity. All of them are fatal.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// No user exists with the configured name.
    #[error("can't find --user named '{name}'")]
    UnknownUser {
        /// Configured user name.
        name: String,
    },
    /// No group exists with the configured name.
    #[error("can't find --group named '{name}'")]
    UnknownGroup {
        /// Configured group name.
        name: String,
    },
    /// The user database lookup itself failed.
    #[error("can't find --user named '{name}': {source}")]
    UserLookup {
        /// Configured user name.
        name: String,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
    /// The group database lookup itself failed.
    #[error("can't find --group named '{name}': {source}")]
    GroupLookup {
        /// Configured group name.
        name: String,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
    /// `setuid` was refused.
    #[error("can't switch to user '{name}': {source}")]
    SwitchUser {
        /// Configured user name.
        name: String,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
    /// `setgid` was refused.
    #[error("can't switch to group '{name}': {source}")]
    SwitchGroup {
        /// Configured group name.
        name: String,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
}

/// Switches to the configured group, then the configured user.
///
/// The group goes first: once the user is no longer root, `setgid` would be
/// refused. With neither option set this is a no-op that still yields the
/// token.
///
/// # Errors
///
/// Returns an error when a name cannot be resolved or the switch is refused.
pub fn drop_privileges(
    options: &ServiceOptions,
    identity: &impl Identity,
) -> Result<DroppedPrivileges, PrivilegeError> {
    if let Some(name) = options.group() {
        drop_group(name, identity)?;
    }
    if let Some(name) = options.user() {
        drop_user(name, identity)?;
    }
    Ok(DroppedPrivileges {
        user: options.user().map(str::to_owned),
        group: options.group().map(str::to_owned),
    })
}

fn drop_user(name: &str, identity: &impl Identity) -> Result<(), PrivilegeError> {
    let uid = identity
        .find_user(name)
        .map_err(|source| PrivilegeError::UserLookup {
            name: name.to_owned(),
            source,
        })?
        .ok_or_else(|| PrivilegeError::UnknownUser {
            name: name.to_owned(),
        })?;
    identity
        .switch_user(uid)
        .map_err(|source| PrivilegeError::SwitchUser {
            name: name.to_owned(),
            source,
        })?;
    info!(target: SERVER_TARGET, user = name, uid = uid.as_raw(), "switched user");
    Ok(())
}

fn drop_group(name: &str, identity: &impl Identity) -> Result<(), PrivilegeError> {
    let gid = identity
        .find_group(name)
        .map_err(|source| PrivilegeError::GroupLookup {
            name: name.to_owned(),
            source,
        })?
        .ok_or_else(|| PrivilegeError::UnknownGroup {
            name: name.to_owned(),
        })?;
    identity
        .switch_group(gid)
        .map_err(|source| PrivilegeError::SwitchGroup {
            name: name.to_owned(),
            source,
        })?;
    info!(target: SERVER_TARGET, group = name, gid = gid.as_raw(), "switched group");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;

    use mizuno_config::Config;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Group(u32),
        User(u32),
    }

    #[derive(Default)]
    struct FakeIdentity {
        calls: RefCell<Vec<Call>>,
        refuse_user: bool,
    }

    impl Identity for FakeIdentity {
        fn find_user(&self, name: &str) -> Result<Option<Uid>, Errno> {
            Ok((name == "www").then(|| Uid::from_raw(33)))
        }

        fn find_group(&self, name: &str) -> Result<Option<Gid>, Errno> {
            Ok((name == "www").then(|| Gid::from_raw(34)))
        }

        fn switch_user(&self, uid: Uid) -> Result<(), Errno> {
            if self.refuse_user {
                return Err(Errno::EPERM);
            }
            self.calls.borrow_mut().push(Call::User(uid.as_raw()));
            Ok(())
        }

        fn switch_group(&self, gid: Gid) -> Result<(), Errno> {
            self.calls.borrow_mut().push(Call::Group(gid.as_raw()));
            Ok(())
        }
    }

    fn options(user: Option<&str>, group: Option<&str>) -> ServiceOptions {
        let config = Config {
            user: user.map(str::to_owned),
            group: group.map(str::to_owned),
            ..Config::default()
        };
        ServiceOptions::resolve(&config, None, Path::new("/srv")).expect("resolve options")
    }

    #[test]
    fn switches_group_before_user() {
        let identity = FakeIdentity::default();
        let token =
            drop_privileges(&options(Some("www"), Some("www")), &identity).expect("drop");
        assert_eq!(*identity.calls.borrow(), vec![Call::Group(34), Call::User(33)]);
        assert_eq!(token.user(), Some("www"));
        assert_eq!(token.group(), Some("www"));
    }

    #[test]
    fn unset_identity_is_a_no_op() {
        let identity = FakeIdentity::default();
        let token = drop_privileges(&options(None, None), &identity).expect("drop");
        assert!(identity.calls.borrow().is_empty());
        assert_eq!(token.user(), None);
    }

    #[rstest]
    #[case::user(Some("nobody-here"), None, "can't find --user named 'nobody-here'")]
    #[case::group(None, Some("nobody-here"), "can't find --group named 'nobody-here'")]
    fn unknown_names_are_fatal(
        #[case] user: Option<&str>,
        #[case] group: Option<&str>,
        #[case] message: &str,
    ) {
        let identity = FakeIdentity::default();
        let error = drop_privileges(&options(user, group), &identity).expect_err("unknown name");
        assert_eq!(error.to_string(), message);
        assert!(identity.calls.borrow().is_empty());
    }

    #[test]
    fn refused_switch_is_fatal() {
        let identity = FakeIdentity {
            refuse_user: true,
            ..FakeIdentity::default()
        };
        let error = drop_privileges(&options(Some("www"), None), &identity)
            .expect_err("setuid refused");
        assert!(matches!(error, PrivilegeError::SwitchUser { ref name, .. } if name == "www"));
        assert!(
            error.to_string().starts_with("can't switch to user 'www'"),
            "unexpected message: {error}"
        );
    }
}
