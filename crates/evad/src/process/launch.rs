//! Launch sequencing for the daemon process.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Collaborators required to launch the daemon.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the daemon with production collaborators until a termination signal
/// arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] for the first stage that fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(),
    })
}

/// Bootstraps, initialises and serves, then shuts down in reverse order.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    let daemon = bootstrap_with(&loader, reporter)?;
    let runtime = build_runtime()?;
    let dispatcher = Arc::clone(daemon.dispatcher());
    runtime.block_on(dispatcher.initialize())?;
    info!(
        target: PROCESS_TARGET,
        capabilities = %serde_json::Value::Object(dispatcher.capabilities().clone()),
        "dispatcher ready"
    );

    let listener = SocketListener::bind(daemon.config().daemon_socket())?;
    if let Some(addr) = listener.local_addr() {
        info!(target: PROCESS_TARGET, %addr, "listening on tcp");
    }
    let handler = Arc::new(DispatchConnectionHandler::new(
        dispatcher,
        runtime.handle().clone(),
    ));
    let listener_handle = listener.start(handler)?;

    let waited = shutdown.wait();
    info!(target: PROCESS_TARGET, "stopping listener");
    listener_handle.shutdown();
    let joined = listener_handle.join();
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    waited?;
    joined?;

    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn build_runtime() -> Result<Runtime, LaunchError> {
    Builder::new_multi_thread()
        .enable_time()
        .thread_name("evad-worker")
        .build()
        .map_err(|source| LaunchError::Runtime { source })
}
