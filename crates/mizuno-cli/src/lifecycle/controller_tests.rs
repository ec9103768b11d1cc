//! Controller state machine tests over fake process, signal, probe, and
//! spawn seams.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::Duration;

use camino::Utf8PathBuf;
use mizuno_config::{Config, ServiceOptions};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::lifecycle::controller::DaemonController;
use crate::lifecycle::lock::lock_path;
use crate::lifecycle::probe::{Attempt, Probe};
use crate::lifecycle::process_table::ProcessTable;
use crate::lifecycle::signal::{ControlSignal, Signaller};
use crate::lifecycle::spawning::{SpawnedChild, Spawner};
use crate::lifecycle::{LifecycleCommand, LifecycleError, LifecycleOutput, Report};

const CHILD_PID: u32 = 4242;

/// Shared view of the fake operating system.
#[derive(Debug, Default)]
struct World {
    live: Option<u32>,
    signals: Vec<(u32, ControlSignal)>,
    spawned: usize,
    reaped: usize,
    comes_up: bool,
    goes_down: bool,
    probes: usize,
}

type Shared = Rc<RefCell<World>>;

struct FakeTable(Shared);

impl ProcessTable for FakeTable {
    fn is_service(&self, pid: u32) -> Result<bool, LifecycleError> {
        Ok(self.0.borrow().live == Some(pid))
    }
}

struct FakeSignaller(Shared);

impl Signaller for FakeSignaller {
    fn send(&self, pid: u32, signal: ControlSignal) -> Result<(), LifecycleError> {
        self.0.borrow_mut().signals.push((pid, signal));
        Ok(())
    }
}

struct FakeProbe(Shared);

impl Probe for FakeProbe {
    fn attempt(&self) -> Attempt {
        Attempt::Responded
    }

    fn probe_until_up(&self, _budget: Duration) -> bool {
        let mut world = self.0.borrow_mut();
        world.probes += 1;
        world.comes_up
    }

    fn probe_until_down(&self, _budget: Duration) -> bool {
        let mut world = self.0.borrow_mut();
        world.probes += 1;
        world.goes_down
    }
}

struct FakeSpawner(Shared);

impl Spawner for FakeSpawner {
    fn spawn(&self, _options: &ServiceOptions) -> Result<Box<dyn SpawnedChild>, LifecycleError> {
        let mut world = self.0.borrow_mut();
        world.spawned += 1;
        world.live = Some(CHILD_PID);
        Ok(Box::new(FakeChild(Rc::clone(&self.0))))
    }
}

struct FakeChild(Shared);

impl SpawnedChild for FakeChild {
    fn pid(&self) -> u32 {
        CHILD_PID
    }

    fn terminate_and_reap(&mut self) {
        let mut world = self.0.borrow_mut();
        world.reaped += 1;
        world.live = None;
    }
}

type Controller = DaemonController<FakeTable, FakeSignaller, FakeProbe, FakeSpawner>;

struct Harness {
    _dir: TempDir,
    pidfile: Utf8PathBuf,
    world: Shared,
    controller: Controller,
}

impl Harness {
    fn run(&self, command: LifecycleCommand) -> (Result<Report, LifecycleError>, String) {
        let mut output = LifecycleOutput::new(Vec::new(), Vec::new());
        let result = self.controller.handle(command, &mut output);
        let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
        (result, stdout)
    }

    fn record_running(&self, pid: u32) {
        fs::write(&self.pidfile, format!("{pid}\n")).expect("write pid file");
        self.world.borrow_mut().live = Some(pid);
    }

    fn pidfile_contents(&self) -> Option<String> {
        fs::read_to_string(&self.pidfile).ok()
    }
}

#[fixture]
fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let pidfile = Utf8PathBuf::from_path_buf(dir.path().join("mizuno.pid")).expect("utf8 path");
    let config = Config {
        pidfile: Some(pidfile.to_string()),
        ..Config::default()
    };
    let options = ServiceOptions::resolve(&config, None, dir.path()).expect("resolve options");
    let world = Rc::new(RefCell::new(World {
        comes_up: true,
        goes_down: true,
        ..World::default()
    }));
    let controller = DaemonController::new(
        options,
        FakeTable(Rc::clone(&world)),
        FakeSignaller(Rc::clone(&world)),
        FakeProbe(Rc::clone(&world)),
        FakeSpawner(Rc::clone(&world)),
    );
    Harness {
        _dir: dir,
        pidfile,
        world,
        controller,
    }
}

#[rstest]
fn start_launches_and_records_the_child(harness: Harness) {
    let (result, _) = harness.run(LifecycleCommand::Start);
    let report = result.expect("start succeeds");
    assert!(report.is_success());
    assert_eq!(report.message(), "mizuno started (pid 4242).");
    assert_eq!(harness.pidfile_contents().as_deref(), Some("4242\n"));
    let world = harness.world.borrow();
    assert_eq!(world.spawned, 1);
    assert_eq!(world.reaped, 0);
    assert_eq!(world.probes, 1);
    assert!(!lock_path(&harness.pidfile).exists(), "lock is released");
}

#[rstest]
fn start_refuses_when_already_running(harness: Harness) {
    harness.record_running(77);
    let (result, _) = harness.run(LifecycleCommand::Start);
    let error = result.expect_err("already running");
    assert!(matches!(error, LifecycleError::AlreadyRunning { pid: 77 }));
    assert_eq!(error.to_string(), "mizuno is already running (pid 77).");
    assert_eq!(harness.world.borrow().spawned, 0);
    assert_eq!(harness.pidfile_contents().as_deref(), Some("77\n"));
}

#[rstest]
fn start_replaces_a_stale_pidfile(harness: Harness) {
    fs::write(&harness.pidfile, "77\n").expect("write stale pid");
    let (result, _) = harness.run(LifecycleCommand::Start);
    assert!(result.expect("start succeeds").is_success());
    assert_eq!(harness.pidfile_contents().as_deref(), Some("4242\n"));
}

#[rstest]
fn failed_start_stops_the_child_and_cleans_up(harness: Harness) {
    harness.world.borrow_mut().comes_up = false;
    let (result, _) = harness.run(LifecycleCommand::Start);
    let error = result.expect_err("startup fails");
    assert_eq!(error.to_string(), "failed to start mizuno.");
    assert_eq!(harness.world.borrow().reaped, 1);
    assert_eq!(harness.pidfile_contents(), None);
}

#[rstest]
#[case::not_running(None, true, false, "mizuno doesn't appear to be running.")]
#[case::online(Some(77), true, true, "mizuno is running.")]
#[case::offline(Some(77), false, false, "mizuno is running, but not online.")]
fn status_reports_state(
    harness: Harness,
    #[case] running: Option<u32>,
    #[case] comes_up: bool,
    #[case] success: bool,
    #[case] message: &str,
) {
    if let Some(pid) = running {
        harness.record_running(pid);
    }
    harness.world.borrow_mut().comes_up = comes_up;
    let (result, _) = harness.run(LifecycleCommand::Status);
    let report = result.expect("status always reports");
    assert_eq!(report.is_success(), success);
    assert_eq!(report.message(), message);
}

#[rstest]
fn status_ignores_the_lock(harness: Harness) {
    harness.record_running(77);
    fs::write(
        lock_path(&harness.pidfile),
        format!("{}\n", std::process::id()),
    )
    .expect("write live lock");
    let (result, _) = harness.run(LifecycleCommand::Status);
    assert!(result.expect("status succeeds").is_success());
}

#[rstest]
#[case::start(LifecycleCommand::Start)]
#[case::reload(LifecycleCommand::Reload)]
#[case::stop(LifecycleCommand::Stop)]
#[case::kill(LifecycleCommand::Kill)]
fn mutating_commands_respect_a_live_lock(harness: Harness, #[case] command: LifecycleCommand) {
    harness.record_running(77);
    fs::write(
        lock_path(&harness.pidfile),
        format!("{}\n", std::process::id()),
    )
    .expect("write live lock");
    let (result, _) = harness.run(command);
    assert!(matches!(result, Err(LifecycleError::LockHeld { .. })));
    let world = harness.world.borrow();
    assert!(world.signals.is_empty());
    assert_eq!(world.spawned, 0);
}

#[rstest]
fn reload_sends_one_hangup_without_waiting(harness: Harness) {
    harness.record_running(77);
    let (result, stdout) = harness.run(LifecycleCommand::Reload);
    let report = result.expect("reload succeeds");
    assert_eq!(report.message(), "mizuno signaled to reload app.");
    assert!(stdout.is_empty());
    let world = harness.world.borrow();
    assert_eq!(world.signals, vec![(77, ControlSignal::Hangup)]);
    assert_eq!(world.probes, 0);
}

#[rstest]
#[case::reload(LifecycleCommand::Reload)]
#[case::stop(LifecycleCommand::Stop)]
#[case::kill(LifecycleCommand::Kill)]
fn signalling_commands_need_a_running_daemon(
    harness: Harness,
    #[case] command: LifecycleCommand,
) {
    let (result, _) = harness.run(command);
    let error = result.expect_err("not running");
    assert_eq!(error.to_string(), "mizuno isn't running.");
    assert!(harness.world.borrow().signals.is_empty());
}

#[rstest]
#[case::stop_sends_kill(LifecycleCommand::Stop, ControlSignal::Kill, "stopping mizuno (pid 77)...")]
#[case::kill_sends_term(
    LifecycleCommand::Kill,
    ControlSignal::Terminate,
    "terminating mizuno (pid 77) with extreme prejudice..."
)]
fn halting_signals_waits_and_removes_pidfile(
    harness: Harness,
    #[case] command: LifecycleCommand,
    #[case] signal: ControlSignal,
    #[case] progress: &str,
) {
    harness.record_running(77);
    let (result, stdout) = harness.run(command);
    let report = result.expect("halt succeeds");
    assert!(report.is_success());
    assert_eq!(report.message(), "stopped");
    assert_eq!(stdout, format!("{progress}\n"));
    assert_eq!(harness.pidfile_contents(), None);
    let world = harness.world.borrow();
    assert_eq!(world.signals, vec![(77, signal)]);
    assert_eq!(world.probes, 1);
}

#[rstest]
#[case::stop(LifecycleCommand::Stop)]
#[case::kill(LifecycleCommand::Kill)]
fn halt_failure_keeps_the_pidfile(harness: Harness, #[case] command: LifecycleCommand) {
    harness.record_running(77);
    harness.world.borrow_mut().goes_down = false;
    let (result, _) = harness.run(command);
    let report = result.expect("halt reports");
    assert!(!report.is_success());
    assert_eq!(report.message(), "failed");
    assert_eq!(harness.pidfile_contents().as_deref(), Some("77\n"));
}

#[test]
fn commands_need_a_pidfile() {
    let dir = tempfile::tempdir().expect("temp dir");
    let options =
        ServiceOptions::resolve(&Config::default(), None, dir.path()).expect("resolve options");
    let world: Shared = Rc::default();
    let controller = DaemonController::new(
        options,
        FakeTable(Rc::clone(&world)),
        FakeSignaller(Rc::clone(&world)),
        FakeProbe(Rc::clone(&world)),
        FakeSpawner(Rc::clone(&world)),
    );
    let mut output = LifecycleOutput::new(Vec::new(), Vec::new());
    let error = controller
        .handle(LifecycleCommand::Status, &mut output)
        .expect_err("pidfile required");
    assert_eq!(error.to_string(), "specify a --pidfile to daemonize.");
}
