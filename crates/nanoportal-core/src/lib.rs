//! # nanoPortal Core
//!
//! Request routing and dispatch for nanoPortal: request normalization,
//! explicit path maps with positional `/controller/method/args` fallback,
//! controller dispatch, and response assembly with conditional GET,
//! cache headers and gzip negotiation.
//!
//! This crate is not meant to be used directly. Use `nanoportal` instead.

mod app;
pub mod compression;
mod config;
mod context;
mod controller;
mod error;
mod output;
mod request;
mod response;
mod route_map;
mod router;
mod server;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use app::Portal;
pub use compression::AcceptedEncoding;
pub use config::{load_dotenv, load_dotenv_from, ConfigError, PortalConfig};
pub use context::{AppContext, Cache, MemoryCache};
pub use controller::{
    controller_key, is_routable_action, Action, Controller, Scope, FALLBACK_ACTION,
    RESERVED_ACTIONS,
};
pub use error::{Environment, PortalError, Result};
pub use output::{DataBag, HtmlOutput, JsonOutput, Outcome, Output, Renderer, TextOutput};
pub use request::{Request, RequestId, RequestType};
pub use response::{error_response, HttpResponse, LastModified, MaxAge, Response};
pub use route_map::{MapEntry, RouteMap};
pub use router::{ResolvedRoute, RouteOutcome, RouteParams, Router};
pub use server::DEFAULT_BODY_LIMIT;
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
