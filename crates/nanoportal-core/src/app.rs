//! nanoPortal application entry point

use crate::config::{load_dotenv, ConfigError, PortalConfig};
use crate::context::{AppContext, Cache};
use crate::controller::Controller;
use crate::error::{Environment, PortalError, Result};
use crate::output::{DataBag, HtmlOutput, JsonOutput, Outcome, Output, Renderer};
use crate::request::{Request, RequestType};
use crate::response::{error_response, HttpResponse, Response};
use crate::router::{ResolvedRoute, RouteOutcome, Router};
use crate::server::Server;
use http::header::HeaderValue;
use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Path extensions that select an output format and are stripped before routing
const FORMAT_EXTENSIONS: &[&str] = &["json", "html"];

/// A configured application: router, context and optional renderer.
///
/// # Example
///
/// ```rust,no_run
/// use nanoportal_core::{Controller, Outcome, Portal, PortalConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     Portal::new(PortalConfig::default())
///         .controller(Controller::new("home").action("index", |scope, _| {
///             scope.set("greeting", "hello");
///             Ok(Outcome::None)
///         }))
///         .map("hi", "/home/index")
///         .run("127.0.0.1:8080")
///         .await
/// }
/// ```
pub struct Portal {
    router: Router,
    ctx: AppContext,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Portal {
    /// Create an application from a configuration
    pub fn new(config: PortalConfig) -> Self {
        // Initialize tracing if not already done
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,nanoportal=debug")),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();

        Self {
            router: Router::with_config(&config),
            ctx: AppContext::new(config),
            renderer: None,
        }
    }

    /// Load `.env`, then build from `NANOPORTAL_*` variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        load_dotenv();
        Ok(Self::new(PortalConfig::from_env()?))
    }

    /// Register a controller
    pub fn controller(mut self, controller: Controller) -> Self {
        self.router = self.router.controller(controller);
        self
    }

    /// Register an explicit path map
    pub fn map(mut self, pattern: &str, target: &str) -> Self {
        self.router = self.router.map(pattern, target);
        self
    }

    /// Use a template renderer for non-JSON requests
    pub fn renderer<R: Renderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Register a named service
    pub fn service<T: Send + Sync + 'static>(mut self, name: &str, service: T) -> Self {
        self.ctx.register(name, service);
        self
    }

    /// Replace the cache backend
    pub fn cache<C: Cache + 'static>(mut self, cache: C) -> Self {
        self.ctx = self.ctx.with_cache(cache);
        self
    }

    /// Override the detected environment
    pub fn environment(mut self, environment: Environment) -> Self {
        self.ctx = self.ctx.with_environment(environment);
        self
    }

    /// Application context
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Router (without per-request state)
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one request from routing through emission.
    pub fn handle(&self, mut request: Request) -> HttpResponse {
        let start = Instant::now();
        let format = if request
            .extension()
            .is_some_and(|ext| FORMAT_EXTENSIONS.contains(&ext))
        {
            request.strip_extension()
        } else {
            None
        };

        let span = info_span!(
            "request",
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path(),
        );
        let _guard = span.enter();

        let config = self.ctx.config();
        let mut response = Response::for_request(&request);
        if config.compression {
            response.enable_compression(config.compression_min_size);
        }
        if let Some(seconds) = config.cache_duration {
            response.set_cache_duration(seconds);
        }

        let mut router = self.router.clone();
        let mut http = match router.route(&request, &self.ctx, &mut response) {
            Ok(RouteOutcome::NotFound) => {
                debug!("Unroutable");
                let err = PortalError::not_found(format!("No route for /{}", request.path()));
                error_response(&err, self.ctx.environment())
            }
            Ok(RouteOutcome::Dispatched { route, outcome, data }) => {
                self.respond(&request, format.as_deref(), &route, outcome, data, response)
            }
            Err(err) => self.fail(&err),
        };

        if let Ok(value) = HeaderValue::from_str(request.id().as_str()) {
            http.headers_mut().insert("x-request-id", value);
        }
        if let Some(name) = &config.server_name {
            if let Ok(value) = HeaderValue::from_str(name) {
                http.headers_mut().insert("x-served-by", value);
            }
        }

        log_request(&request, http.status(), start);
        http
    }

    fn respond(
        &self,
        request: &Request,
        format: Option<&str>,
        route: &ResolvedRoute,
        outcome: Outcome,
        data: DataBag,
        mut response: Response,
    ) -> HttpResponse {
        if let Some(head) = response.not_modified() {
            return head;
        }

        match self.render(request, format, route, outcome, data, response.has_content()) {
            Ok(Some(output)) => response.set_boxed_output(output),
            Ok(None) => {}
            Err(err) => return self.fail(&err),
        }

        match response.finish() {
            Ok(http) => http,
            Err(err) => self.fail(&err),
        }
    }

    /// Turn an action's outcome into an output.
    ///
    /// API requests and `.json` paths get JSON. Otherwise the renderer draws
    /// `<controller>/<method>` when that template exists, else JSON.
    /// `None` keeps a body the action already set on the response.
    fn render(
        &self,
        request: &Request,
        format: Option<&str>,
        route: &ResolvedRoute,
        outcome: Outcome,
        mut data: DataBag,
        has_content: bool,
    ) -> Result<Option<Box<dyn Output>>> {
        let value = match outcome {
            Outcome::Output(output) => return Ok(Some(output)),
            Outcome::None if has_content => return Ok(None),
            Outcome::None => None,
            Outcome::Data(value) => Some(value),
        };

        let wants_json = request.kind() == RequestType::Api || format == Some("json");
        let template = format!("{}/{}", route.controller, route.method);
        let renderer = match &self.renderer {
            Some(renderer) if !wants_json && renderer.has_template(&template) => renderer,
            _ => {
                let body = value.unwrap_or_else(|| data.into_value());
                return Ok(Some(Box::new(JsonOutput(body))));
            }
        };

        match value {
            Some(Value::Object(fields)) => {
                for (key, field) in fields {
                    if !data.contains(&key) {
                        data.set(key, field);
                    }
                }
            }
            Some(other) => data.set("data", other),
            None => {}
        }
        debug!(template = %template, "Rendering template");
        let html = renderer.render(&template, &data)?;
        Ok(Some(Box::new(HtmlOutput(html))))
    }

    fn fail(&self, err: &PortalError) -> HttpResponse {
        if err.status.is_server_error() {
            error!(
                status = err.status.as_u16(),
                kind = %err.kind,
                error = %err.message,
                internal = ?err.internal_details(),
                "Request handler failed"
            );
        } else {
            warn!(status = err.status.as_u16(), kind = %err.kind, error = %err.message, "Request rejected");
        }
        error_response(err, self.ctx.environment())
    }

    /// Serve over HTTP/1 until the listener fails
    pub async fn run(self, addr: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Server::new(self).run(addr).await
    }

    /// Serve over HTTP/1 on an already bound listener
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Server::new(self).serve(listener).await
    }
}

impl Default for Portal {
    fn default() -> Self {
        Self::new(PortalConfig::default())
    }
}

/// Log request completion
fn log_request(request: &Request, status: StatusCode, start: Instant) {
    let elapsed = start.elapsed();

    if status.is_server_error() {
        error!(
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Request failed"
        );
    } else {
        info!(
            kind = %request.kind(),
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        );
    }
}
