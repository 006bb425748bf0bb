//! # nanoPortal
//!
//! A small MVC web framework. Requests are routed by path to controller
//! actions (`/controller/method/arg1/arg2`), with optional explicit maps for
//! clean URLs. Responses default to `404`, honor `If-Modified-Since` and
//! `If-None-Match`, and are gzip-compressed when the client allows it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanoportal::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     Portal::new(PortalConfig::default())
//!         .controller(Controller::new("foo").action("bar", |scope, params| {
//!             scope.set("id", params.first());
//!             Ok(Outcome::None)
//!         }))
//!         .map("show/*", "/foo/bar/*")
//!         .run("127.0.0.1:8080")
//!         .await
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `view` (default) - Tera templates via [`view::Templates`]
//! - `test-utils` - In-process `TestClient`

// Re-export core functionality
pub use nanoportal_core::*;

/// Template rendering (feature `view`)
#[cfg(feature = "view")]
pub mod view {
    pub use nanoportal_view::*;
}

/// Prelude module - import everything you need with `use nanoportal::prelude::*`
pub mod prelude {
    pub use nanoportal_core::{
        // Context and services
        AppContext,
        Cache,
        // Controllers
        Controller,
        DataBag,
        Environment,
        // Output wrappers
        HtmlOutput,
        JsonOutput,
        MemoryCache,
        Outcome,
        Output,
        // App builder
        Portal,
        PortalConfig,
        // Error handling
        PortalError,
        Renderer,
        // Request / response
        Request,
        RequestType,
        Response,
        Result,
        // Routing
        RouteOutcome,
        Router,
        Scope,
        TextOutput,
    };

    #[cfg(feature = "view")]
    pub use nanoportal_view::Templates;

    // Re-export commonly used external types
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
