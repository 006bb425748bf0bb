//! Template engine wrapper

use crate::ViewError;
use nanoportal_core::{DataBag, PortalError, Renderer};
use std::sync::{Arc, RwLock};
use tera::Tera;

/// Configuration for the template engine
#[derive(Debug, Clone)]
pub struct TemplatesConfig {
    /// Glob pattern for template files
    pub glob: String,
    /// Suffix tried after a bare `<controller>/<method>` name
    pub extension: String,
    /// Whether to auto-reload templates on every render (debug builds only)
    pub auto_reload: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            glob: "templates/**/*.html".to_string(),
            extension: ".html".to_string(),
            auto_reload: cfg!(debug_assertions),
        }
    }
}

impl TemplatesConfig {
    /// Create a new config with the given glob pattern
    pub fn new(glob: impl Into<String>) -> Self {
        Self {
            glob: glob.into(),
            ..Default::default()
        }
    }

    /// Set the suffix appended when looking up route templates
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set auto-reload behavior
    pub fn auto_reload(mut self, enabled: bool) -> Self {
        self.auto_reload = enabled;
        self
    }
}

/// Thread-safe Tera wrapper implementing the portal's [`Renderer`].
///
/// A route `foo/bar` renders the template named `foo/bar`, or failing that
/// `foo/bar.html` (see [`TemplatesConfig::extension`]).
///
/// # Example
///
/// ```rust
/// use nanoportal_core::{DataBag, Renderer};
/// use nanoportal_view::Templates;
///
/// let templates = Templates::empty();
/// templates.add_template("foo/bar.html", "id={{ id }}").unwrap();
///
/// let mut data = DataBag::new();
/// data.set("id", "123");
/// assert_eq!(Renderer::render(&templates, "foo/bar", &data).unwrap(), "id=123");
/// ```
#[derive(Clone)]
pub struct Templates {
    inner: Arc<RwLock<Tera>>,
    config: TemplatesConfig,
}

impl Templates {
    /// Create a template engine from a glob pattern
    ///
    /// # Errors
    ///
    /// Returns an error if the glob pattern is invalid or templates fail to parse.
    pub fn new(glob: impl Into<String>) -> Result<Self, ViewError> {
        Self::with_config(TemplatesConfig::new(glob))
    }

    /// Create a template engine with configuration
    pub fn with_config(config: TemplatesConfig) -> Result<Self, ViewError> {
        let tera = Tera::new(&config.glob)?;

        tracing::debug!(
            glob = %config.glob,
            templates = tera.get_template_names().count(),
            "Templates loaded"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(tera)),
            config,
        })
    }

    /// Create an empty template engine (for adding templates programmatically)
    pub fn empty() -> Self {
        let tera = Tera::default();
        Self {
            inner: Arc::new(RwLock::new(tera)),
            config: TemplatesConfig::default().auto_reload(false),
        }
    }

    /// Add a template from a string
    pub fn add_template(
        &self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), ViewError> {
        let mut tera = self.inner.write().map_err(|_| ViewError::Poisoned)?;
        tera.add_raw_template(&name.into(), &content.into())?;
        Ok(())
    }

    /// Render a named template with a serializable context
    pub fn render_with<T: serde::Serialize>(
        &self,
        template: &str,
        data: &T,
    ) -> Result<String, ViewError> {
        let context =
            tera::Context::from_serialize(data).map_err(|e| ViewError::context(e.to_string()))?;

        #[cfg(debug_assertions)]
        if self.config.auto_reload {
            let mut tera = self.inner.write().map_err(|_| ViewError::Poisoned)?;
            if let Err(e) = tera.full_reload() {
                tracing::warn!("Template reload failed: {}", e);
            }
        }

        let tera = self.inner.read().map_err(|_| ViewError::Poisoned)?;
        let name = self
            .resolve(&tera, template)
            .ok_or_else(|| ViewError::NotFound(template.to_string()))?;
        Ok(tera.render(&name, &context)?)
    }

    /// Map a route template name to a registered one
    fn resolve(&self, tera: &Tera, template: &str) -> Option<String> {
        let suffixed = format!("{}{}", template, self.config.extension);
        tera.get_template_names()
            .find(|name| *name == template)
            .or_else(|| tera.get_template_names().find(|name| *name == suffixed))
            .map(String::from)
    }

    /// Get all template names
    pub fn template_names(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(tera) => tera.get_template_names().map(String::from).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Reload all templates from disk
    pub fn reload(&self) -> Result<(), ViewError> {
        let mut tera = self.inner.write().map_err(|_| ViewError::Poisoned)?;
        tera.full_reload()?;
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &TemplatesConfig {
        &self.config
    }
}

impl Renderer for Templates {
    fn render(&self, template: &str, data: &DataBag) -> Result<String, PortalError> {
        self.render_with(template, data.as_map())
            .map_err(PortalError::from)
    }

    fn has_template(&self, template: &str) -> bool {
        match self.inner.read() {
            Ok(tera) => self.resolve(&tera, template).is_some(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_data_bag() {
        let templates = Templates::empty();
        templates
            .add_template("greet/hello.html", "Hello, {{ name }}!")
            .unwrap();

        let mut data = DataBag::new();
        data.set("name", "World");

        assert!(templates.has_template("greet/hello"));
        assert!(!templates.has_template("greet/bye"));
        let result = Renderer::render(&templates, "greet/hello", &data).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_exact_name_wins() {
        let templates = Templates::empty();
        templates.add_template("a/b", "exact").unwrap();
        templates.add_template("a/b.html", "suffixed").unwrap();
        assert_eq!(templates.render_with("a/b", &DataBag::new().as_map()).unwrap(), "exact");
    }

    #[test]
    fn test_missing_template() {
        let templates = Templates::empty();
        let err = templates.render_with("nope", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ViewError::NotFound(ref name) if name == "nope"));
    }
}
