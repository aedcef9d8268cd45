//! Lifecycle, routing and the per-request error boundary.
//!
//! A [`Dispatcher`] starts `Uninitialised`. [`Dispatcher::initialize`] brings
//! every registered component up in registration order and then loads the
//! model catalog; success moves it to `Ready`, any failure to the terminal
//! `Failed` state.
//!
//! [`Dispatcher::process_request`] never fails: every error raised while
//! routing or handling a request becomes a failure [`Response`] carrying the
//! request's correlation id. Each request runs as its own tokio task, gated
//! by an in-flight limit and bounded by the configured deadline.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use eva_config::Config;
use eva_protocol::{Payload, Request, RequestParts, Response, ResponseMetadata};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::components::CapabilityComponent;
use crate::health::HealthReporter;

use super::DISPATCH_TARGET;
use super::catalog::{CatalogEntry, DEFAULT_CATALOG, ModelCatalog};
use super::errors::{DispatchError, InitialisationError};
use super::general::GeneralHandler;
use super::registry::ComponentRegistry;

const DEFAULT_MODEL: &str = "default";
const MODEL_OPTION_KEYS: [&str; 2] = ["model_id", "network_id"];

/// Dispatcher lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// `initialize` has not completed yet.
    Uninitialised,
    /// All components and the catalog are loaded.
    Ready,
    /// Initialisation failed; the dispatcher only returns failures.
    Failed,
}

/// Limits applied to request execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Deadline for one request, including time spent waiting for a permit.
    pub request_timeout: Duration,
    /// Maximum number of requests running at once.
    pub max_in_flight: usize,
}

impl DispatcherSettings {
    /// Reads the limits from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_in_flight: config.max_in_flight(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

enum Route {
    Component(Arc<dyn CapabilityComponent>),
    General(GeneralHandler),
}

impl Route {
    async fn run(self, parts: RequestParts) -> Result<Payload, DispatchError> {
        match self {
            Self::Component(component) => component
                .process(&parts.method, &parts.data, &parts.options)
                .await
                .map_err(DispatchError::from),
            Self::General(handler) => handler.handle(&parts.method),
        }
    }
}

/// Routes requests to capability components.
pub struct Dispatcher {
    registry: ComponentRegistry,
    settings: DispatcherSettings,
    reporter: Arc<dyn HealthReporter>,
    lifecycle: RwLock<Lifecycle>,
    initialising: Mutex<()>,
    catalog_source: Vec<CatalogEntry>,
    catalog: OnceCell<ModelCatalog>,
    capabilities: Arc<Payload>,
    limiter: Arc<Semaphore>,
    started_at: Instant,
}

impl Dispatcher {
    /// Builds an uninitialised dispatcher over `registry`.
    #[must_use]
    pub fn new(
        registry: ComponentRegistry,
        settings: DispatcherSettings,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        let capabilities = Arc::new(registry.capabilities());
        Self {
            limiter: Arc::new(Semaphore::new(settings.max_in_flight.max(1))),
            registry,
            settings,
            reporter,
            lifecycle: RwLock::new(Lifecycle::Uninitialised),
            initialising: Mutex::new(()),
            catalog_source: DEFAULT_CATALOG.to_vec(),
            catalog: OnceCell::new(),
            capabilities,
            started_at: Instant::now(),
        }
    }

    /// Replaces the catalog loaded during initialisation.
    #[must_use]
    pub fn with_catalog(mut self, entries: Vec<CatalogEntry>) -> Self {
        self.catalog_source = entries;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        *self
            .lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether initialisation has completed successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// Capability tags keyed by component name.
    #[must_use]
    pub fn capabilities(&self) -> &Payload {
        &self.capabilities
    }

    /// Registered components.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Initialises every component, then loads the model catalog.
    ///
    /// Calling this again once `Ready` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`InitialisationError`] when a component or the catalog fails;
    /// the dispatcher is then `Failed` for good and later calls return
    /// [`InitialisationError::AlreadyFailed`].
    pub async fn initialize(&self) -> Result<(), InitialisationError> {
        let _guard = self.initialising.lock().await;
        match self.lifecycle() {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::Failed => return Err(InitialisationError::AlreadyFailed),
            Lifecycle::Uninitialised => {}
        }

        match self.initialise_components().await {
            Ok(models_loaded) => {
                self.set_lifecycle(Lifecycle::Ready);
                self.reporter
                    .dispatcher_ready(self.registry.len(), models_loaded);
                Ok(())
            }
            Err(error) => {
                self.set_lifecycle(Lifecycle::Failed);
                self.reporter.dispatcher_failed(&error);
                Err(error)
            }
        }
    }

    async fn initialise_components(&self) -> Result<usize, InitialisationError> {
        for entry in self.registry.iter() {
            self.reporter.component_initialising(entry.name());
            if let Err(error) = entry.component().initialize().await {
                self.reporter.component_failed(&error);
                return Err(error.into());
            }
            self.reporter.component_ready(entry.name());
        }

        let catalog = ModelCatalog::load(&self.catalog_source)?;
        info!(
            target: DISPATCH_TARGET,
            models = catalog.len(),
            "model catalog loaded"
        );
        let catalog = self.catalog.get_or_init(|| catalog);
        Ok(catalog.len())
    }

    fn set_lifecycle(&self, state: Lifecycle) {
        *self
            .lifecycle
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Handles one request and always returns its response.
    pub async fn process_request(&self, request: Request) -> Response {
        let started = Instant::now();
        let parts = request.into_parts();
        let request_id = parts.request_id.clone();
        let method = parts.method.clone();

        debug!(
            target: DISPATCH_TARGET,
            %request_id,
            %method,
            "processing request"
        );

        let outcome = match self.resolve(&method) {
            Ok((route, route_default)) => {
                let model_used = match route {
                    Route::Component(_) => Self::model_used(&parts.options, route_default),
                    Route::General(_) => route_default,
                };
                self.execute(route, parts)
                    .await
                    .map(|result| (result, model_used))
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok((result, model_used)) => Response::success(
                request_id,
                result,
                ResponseMetadata {
                    processing_time: started.elapsed().as_secs_f64(),
                    model_used,
                },
            ),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    %request_id,
                    %method,
                    %error,
                    "request failed"
                );
                Response::failure(request_id, error.to_string())
            }
        }
    }

    fn resolve(&self, method: &str) -> Result<(Route, String), DispatchError> {
        let lifecycle = self.lifecycle();
        if lifecycle == Lifecycle::Failed {
            return Err(DispatchError::Unavailable);
        }

        match self.registry.lookup(method) {
            Some(_) if lifecycle != Lifecycle::Ready => Err(DispatchError::not_ready(method)),
            Some(entry) => {
                let default_model = self
                    .catalog
                    .get()
                    .and_then(|catalog| catalog.default_for(entry.name()))
                    .unwrap_or(DEFAULT_MODEL);
                Ok((
                    Route::Component(Arc::clone(entry.component())),
                    default_model.to_owned(),
                ))
            }
            None => Ok((
                Route::General(self.general_handler(lifecycle)),
                DEFAULT_MODEL.to_owned(),
            )),
        }
    }

    fn general_handler(&self, lifecycle: Lifecycle) -> GeneralHandler {
        GeneralHandler {
            initialized: lifecycle == Lifecycle::Ready,
            models_loaded: self.catalog.get().map_or(0, ModelCatalog::len),
            uptime: self.started_at.elapsed(),
            capabilities: Arc::clone(&self.capabilities),
        }
    }

    async fn execute(&self, route: Route, parts: RequestParts) -> Result<Payload, DispatchError> {
        let method = parts.method.clone();
        let timeout = self.settings.request_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let timed_out = || DispatchError::timeout(method.as_str(), timeout.as_millis());

        let permit = match tokio::time::timeout_at(
            deadline,
            Arc::clone(&self.limiter).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(DispatchError::Unavailable),
            Err(_elapsed) => return Err(timed_out()),
        };

        let mut task = tokio::spawn(async move {
            let _permit = permit;
            route.run(parts).await
        });

        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(DispatchError::internal(format!(
                "handler for '{method}' did not complete: {join_error}"
            ))),
            Err(_elapsed) => {
                task.abort();
                Err(timed_out())
            }
        }
    }
}

impl Dispatcher {
    /// Model reported in metadata: an explicit id from the options, else the
    /// route's default.
    fn model_used(options: &Payload, route_default: String) -> String {
        MODEL_OPTION_KEYS
            .iter()
            .find_map(|key| options.get(*key).and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map_or(route_default, str::to_owned)
    }
}
