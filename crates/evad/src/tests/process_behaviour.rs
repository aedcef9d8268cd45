//! Behavioural tests covering the daemon process lifecycle.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use crate::bootstrap::ConfigLoader;
use crate::process::launch::{LaunchPlan, run_daemon_with};
use crate::process::{LaunchError, ShutdownError, ShutdownSignal};

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader};

/// Shutdown double that sends one request line over the live socket and
/// then lets the daemon stop.
struct ProbeThenShutdown {
    socket: PathBuf,
    request: String,
    responses: Arc<Mutex<Vec<Value>>>,
}

impl ProbeThenShutdown {
    fn probe(&self) -> std::io::Result<Vec<Value>> {
        let mut stream = UnixStream::connect(&self.socket)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        stream.write_all(self.request.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.shutdown(Shutdown::Write)?;
        BufReader::new(stream)
            .lines()
            .map(|line| {
                let line = line?;
                serde_json::from_str(&line).map_err(std::io::Error::other)
            })
            .collect()
    }
}

impl ShutdownSignal for ProbeThenShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let responses = self.probe().expect("probe the running daemon");
        self.responses
            .lock()
            .expect("responses mutex poisoned")
            .extend(responses);
        Ok(())
    }
}

struct ProcessWorld {
    loader: Option<Arc<dyn ConfigLoader>>,
    socket: Option<PathBuf>,
    reporter: Arc<RecordingHealthReporter>,
    responses: Arc<Mutex<Vec<Value>>>,
    result: Option<Result<(), LaunchError>>,
}

impl ProcessWorld {
    fn new() -> Self {
        Self {
            loader: None,
            socket: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            responses: Arc::new(Mutex::new(Vec::new())),
            result: None,
        }
    }

    fn run(&mut self) {
        let loader = Arc::clone(self.loader.as_ref().expect("loader configured"));
        let shutdown = ProbeThenShutdown {
            socket: self.socket.clone().unwrap_or_default(),
            request: json!({
                "method": "health_check",
                "data": "",
                "options": "",
                "request_id": "probe-1",
            })
            .to_string(),
            responses: Arc::clone(&self.responses),
        };
        self.result = Some(run_daemon_with(LaunchPlan {
            loader,
            reporter: self.reporter.clone(),
            shutdown,
        }));
    }

    fn result(&self) -> &Result<(), LaunchError> {
        self.result.as_ref().expect("daemon has run")
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::new())
}

#[given("a daemon configured with a temporary socket")]
fn given_temporary_socket(world: &RefCell<ProcessWorld>) {
    let loader = TestConfigLoader::new();
    let mut world = world.borrow_mut();
    world.socket = Some(loader.socket_path());
    world.loader = Some(Arc::new(loader));
}

#[given("a daemon configured with an invalid socket")]
fn given_invalid_socket(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().loader = Some(Arc::new(FailingConfigLoader));
}

#[when("the daemon runs and a health check is sent before shutdown")]
fn when_daemon_runs_with_probe(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().run();
}

#[when("the daemon runs")]
fn when_daemon_runs(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().run();
}

#[then("the daemon run completes successfully")]
fn then_run_succeeds(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    assert!(world.result().is_ok(), "daemon failed: {:?}", world.result());
}

#[then("the health check reported an initialised dispatcher")]
fn then_health_reported(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    let responses = world.responses.lock().expect("responses mutex poisoned");
    let response = responses.first().expect("one response");
    assert_eq!(response.get("request_id"), Some(&json!("probe-1")));
    assert_eq!(response.pointer("/result/initialized"), Some(&json!(true)));
    assert_eq!(response.pointer("/result/models_loaded"), Some(&json!(2)));
}

#[then("the socket file was removed")]
fn then_socket_removed(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    let socket = world.socket.as_ref().expect("socket path");
    assert!(!socket.exists(), "socket file should be removed on shutdown");
}

#[then("the daemon run fails during bootstrap")]
fn then_run_fails(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.result(), Err(LaunchError::Bootstrap { .. })),
        "expected bootstrap failure, got {:?}",
        world.result()
    );
}

#[then("the process reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<ProcessWorld>) {
    let events = world.borrow().reporter.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, HealthEvent::BootstrapFailed(_))),
        "bootstrap failure event missing: {events:?}"
    );
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "The daemon serves requests until shutdown"
)]
fn daemon_serves_until_shutdown(#[from(world)] world: RefCell<ProcessWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "The daemon refuses to start with invalid configuration"
)]
fn daemon_refuses_invalid_configuration(#[from(world)] world: RefCell<ProcessWorld>) {
    let _ = world;
}
