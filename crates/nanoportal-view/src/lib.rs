//! # nanoportal-view
//!
//! Tera-backed template rendering for nanoPortal.
//!
//! [`Templates`] implements the core [`Renderer`](nanoportal_core::Renderer)
//! contract: when a controller action finishes, the portal renders the
//! template named after the resolved route (`<controller>/<method>`) with
//! the action's data bag as context.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanoportal_core::{Controller, Outcome, Portal, PortalConfig};
//! use nanoportal_view::Templates;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // templates/news/show.html: <h1>{{ title }}</h1>
//!     let templates = Templates::new("templates/**/*.html")?;
//!
//!     Portal::new(PortalConfig::default())
//!         .renderer(templates)
//!         .controller(Controller::new("news").action("show", |scope, params| {
//!             scope.set("title", format!("Story {}", params.join("/")));
//!             Ok(Outcome::None)
//!         }))
//!         .run("127.0.0.1:8080")
//!         .await
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod templates;

pub use error::ViewError;
pub use templates::{Templates, TemplatesConfig};

// Re-export tera types that users might need
pub use tera::Context;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Context, Templates, TemplatesConfig, ViewError};
}
