//! High-level orchestration for daemon lifecycle commands.
//!
//! Each command reconciles the pid file first, then acts:
//!
//! | command | needs       | action                                   |
//! |---------|-------------|------------------------------------------|
//! | start   | not running | spawn, record pid, wait until it answers |
//! | status  | running     | wait until it answers                    |
//! | reload  | running     | SIGHUP, no waiting                       |
//! | stop    | running     | SIGKILL, wait until it stops answering   |
//! | kill    | running     | SIGTERM, wait until it stops answering   |
//!
//! Every command except `status` runs under the lifecycle lock.

use std::io::Write;

use mizuno_config::ServiceOptions;
use tracing::{info, warn};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use super::lock::LifecycleLock;
use super::pid::PidRegistry;
use super::probe::{HttpProbe, Probe};
use super::process_table::{ProcessTable, SystemProcessTable};
use super::signal::{ControlSignal, Signaller, SystemSignaller};
use super::spawning::{DetachedSpawner, Spawner};
use super::types::{LifecycleCommand, LifecycleOutput, Report};

/// Lifecycle controller wired to the operating system.
pub type SystemLifecycle =
    DaemonController<SystemProcessTable, SystemSignaller, HttpProbe, DetachedSpawner>;

impl SystemLifecycle {
    /// Builds the production controller for `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when the liveness probe cannot be built.
    pub fn from_options(options: ServiceOptions) -> Result<Self, LifecycleError> {
        let probe = HttpProbe::new(options.host(), options.port(), options.probe_timeout())?;
        Ok(DaemonController::new(
            options,
            SystemProcessTable,
            SystemSignaller,
            probe,
            DetachedSpawner::new(),
        ))
    }
}

/// Runs lifecycle commands against injectable process, signal, probe, and
/// spawn seams.
pub struct DaemonController<T, S, P, X> {
    options: ServiceOptions,
    table: T,
    signaller: S,
    probe: P,
    spawner: X,
}

impl<T, S, P, X> DaemonController<T, S, P, X>
where
    T: ProcessTable,
    S: Signaller,
    P: Probe,
    X: Spawner,
{
    pub const fn new(options: ServiceOptions, table: T, signaller: S, probe: P, spawner: X) -> Self {
        Self {
            options,
            table,
            signaller,
            probe,
            spawner,
        }
    }

    /// Executes `command`, writing progress lines to `output`.
    ///
    /// Expected outcomes, including "not online" and a failed stop, come
    /// back as a [`Report`]; violated preconditions come back as errors.
    ///
    /// # Errors
    ///
    /// Returns an error when no pid file is configured, the daemon is in the
    /// wrong state for `command`, or the filesystem, process table, or
    /// signal delivery fails.
    pub fn handle<W: Write, E: Write>(
        &self,
        command: LifecycleCommand,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<Report, LifecycleError> {
        let registry = PidRegistry::from_options(&self.options, &self.table)?;
        let _lock = if command.mutates_state() {
            Some(LifecycleLock::acquire(registry.path())?)
        } else {
            None
        };
        match command {
            LifecycleCommand::Start => self.start(&registry),
            LifecycleCommand::Status => self.status(&registry),
            LifecycleCommand::Reload => self.reload(&registry),
            LifecycleCommand::Stop => self.halt(&registry, ControlSignal::Kill, output),
            LifecycleCommand::Kill => self.halt(&registry, ControlSignal::Terminate, output),
        }
    }

    fn start(&self, registry: &PidRegistry<'_, T>) -> Result<Report, LifecycleError> {
        if let Some(pid) = registry.current_pid()? {
            return Err(LifecycleError::AlreadyRunning { pid });
        }
        let mut child = self.spawner.spawn(&self.options)?;
        let pid = child.pid();
        if let Err(error) = registry.write(pid) {
            child.terminate_and_reap();
            return Err(error);
        }
        info!(target: LIFECYCLE_TARGET, pid, file = %registry.path(), "service launched");

        if self.probe.probe_until_up(self.options.probe_timeout()) {
            return Ok(Report::success(format!("mizuno started (pid {pid}).")));
        }
        warn!(target: LIFECYCLE_TARGET, pid, "service did not come online; stopping it");
        child.terminate_and_reap();
        registry.remove()?;
        Err(LifecycleError::StartupFailed { pid })
    }

    fn status(&self, registry: &PidRegistry<'_, T>) -> Result<Report, LifecycleError> {
        if registry.current_pid()?.is_none() {
            return Ok(Report::failure("mizuno doesn't appear to be running."));
        }
        if self.probe.probe_until_up(self.options.probe_timeout()) {
            Ok(Report::success("mizuno is running."))
        } else {
            Ok(Report::failure("mizuno is running, but not online."))
        }
    }

    fn reload(&self, registry: &PidRegistry<'_, T>) -> Result<Report, LifecycleError> {
        let pid = registry.current_pid()?.ok_or(LifecycleError::NotRunning)?;
        self.signaller.send(pid, ControlSignal::Hangup)?;
        Ok(Report::success("mizuno signaled to reload app."))
    }

    fn halt<W: Write, E: Write>(
        &self,
        registry: &PidRegistry<'_, T>,
        signal: ControlSignal,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<Report, LifecycleError> {
        let pid = registry.current_pid()?.ok_or(LifecycleError::NotRunning)?;
        match signal {
            ControlSignal::Terminate => output.stdout_line(format_args!(
                "terminating mizuno (pid {pid}) with extreme prejudice..."
            ))?,
            ControlSignal::Kill | ControlSignal::Hangup => {
                output.stdout_line(format_args!("stopping mizuno (pid {pid})..."))?;
            }
        }
        self.signaller.send(pid, signal)?;
        if !self.probe.probe_until_down(self.options.probe_timeout()) {
            warn!(target: LIFECYCLE_TARGET, pid, %signal, "service still answering");
            return Ok(Report::failure("failed"));
        }
        registry.remove()?;
        Ok(Report::success("stopped"))
    }
}
