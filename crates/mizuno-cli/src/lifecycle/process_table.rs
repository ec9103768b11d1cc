//! Process table lookups used to validate a recorded pid.
//!
//! A pid is only trusted when a live process with that id exists *and*
//! mentions `mizuno` as a whole word in its name or command line; pids are
//! recycled, so existence alone is not enough.

use std::io;
use std::process::Command;

use sysinfo::{Pid, ProcessStatus, System};

use super::error::LifecycleError;

/// Token identifying the service in the process table.
pub(crate) const SERVICE_TOKEN: &str = "mizuno";

/// Answers whether a pid belongs to a running service instance.
pub trait ProcessTable {
    /// Whether `pid` is alive and identifies as the service.
    ///
    /// # Errors
    ///
    /// Returns an error when the process table cannot be read.
    fn is_service(&self, pid: u32) -> Result<bool, LifecycleError>;
}

/// Queries `sysinfo`, falling back to `ps` where it is unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn is_service(&self, pid: u32) -> Result<bool, LifecycleError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            SysinfoProcessTable.is_service(pid)
        } else {
            PsProcessTable.is_service(pid)
        }
    }
}

/// Process table backed by the `sysinfo` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProcessTable;

impl ProcessTable for SysinfoProcessTable {
    fn is_service(&self, pid: u32) -> Result<bool, LifecycleError> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        if !system.refresh_process(pid) {
            return Ok(false);
        }
        Ok(system.process(pid).is_some_and(|process| {
            process.status() != ProcessStatus::Zombie
                && (mentions_service(process.name())
                    || process.cmd().iter().any(|arg| mentions_service(arg)))
        }))
    }
}

/// Process table parsed from `ps ax` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct PsProcessTable;

impl ProcessTable for PsProcessTable {
    fn is_service(&self, pid: u32) -> Result<bool, LifecycleError> {
        let output = Command::new("ps")
            .args(["ax", "-o", "pid=,stat=,command="])
            .output()
            .map_err(|source| LifecycleError::ProcessTable { source })?;
        if !output.status.success() {
            return Err(LifecycleError::ProcessTable {
                source: io::Error::other(format!("ps exited with {}", output.status)),
            });
        }
        Ok(listing_has_service(
            &String::from_utf8_lossy(&output.stdout),
            pid,
        ))
    }
}

/// Scans `pid stat command` rows for a live service process with `pid`.
pub(crate) fn listing_has_service(listing: &str, pid: u32) -> bool {
    listing.lines().any(|line| {
        let mut fields = line.split_whitespace();
        let Some(row_pid) = fields.next().and_then(|field| field.parse::<u32>().ok()) else {
            return false;
        };
        let zombie = fields.next().is_some_and(|stat| stat.starts_with('Z'));
        row_pid == pid && !zombie && fields.any(mentions_service)
    })
}

/// Whole-word match for [`SERVICE_TOKEN`], treating `[A-Za-z0-9_]` as word
/// characters.
pub(crate) fn mentions_service(text: &str) -> bool {
    text.split(|character: char| !(character.is_ascii_alphanumeric() || character == '_'))
        .any(|word| word == SERVICE_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("mizuno", true)]
    #[case::path("/usr/local/bin/mizuno", true)]
    #[case::hyphenated("mizuno-cli", true)]
    #[case::prefix("mizunox", false)]
    #[case::suffix("amizuno", false)]
    #[case::underscore("mizuno_old", false)]
    #[case::unrelated("nginx", false)]
    fn matches_service_token_as_a_whole_word(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(mentions_service(text), expected);
    }

    const LISTING: &str = "\
      1 Ss   /sbin/init
    420 Sl   /opt/bin/mizuno --port 9292 serve index.html
    421 Z    [mizuno] <defunct>
    422 S    /usr/bin/vim notes/mizuno.txt
    500 S    /usr/sbin/sshd -D
";

    #[rstest]
    #[case::service(420, true)]
    #[case::zombie(421, false)]
    #[case::other_program_mentioning_token(422, true)]
    #[case::unrelated(500, false)]
    #[case::absent(999, false)]
    fn scans_ps_listing(#[case] pid: u32, #[case] expected: bool) {
        assert_eq!(listing_has_service(LISTING, pid), expected);
    }

    #[test]
    fn missing_pid_is_not_the_service() {
        assert!(!SystemProcessTable.is_service(99_999_999).expect("query process table"));
    }
}
