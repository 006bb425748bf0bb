//! Template errors

use nanoportal_core::PortalError;
use thiserror::Error;

/// Errors raised while loading or rendering templates
#[derive(Debug, Error)]
pub enum ViewError {
    /// Tera failed to parse or render a template
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// No template is registered under this name
    #[error("template not found: {0}")]
    NotFound(String),

    /// The data could not be turned into a template context
    #[error("failed to build template context: {0}")]
    Context(String),

    /// A thread panicked while holding the template lock
    #[error("template engine lock poisoned")]
    Poisoned,
}

impl ViewError {
    /// Create a context error
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context(message.into())
    }
}

impl From<ViewError> for PortalError {
    fn from(err: ViewError) -> Self {
        let details = match &err {
            // Tera keeps the useful part of the message in the source chain
            ViewError::Template(inner) => {
                let mut details = inner.to_string();
                let mut source = std::error::Error::source(inner);
                while let Some(cause) = source {
                    details.push_str(": ");
                    details.push_str(&cause.to_string());
                    source = cause.source();
                }
                details
            }
            other => other.to_string(),
        };
        PortalError::internal("Failed to render template").with_internal(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_portal_error_hides_details() {
        let err: PortalError = ViewError::NotFound("foo/bar".into()).into();
        assert_eq!(err.status.as_u16(), 500);
        assert_eq!(err.message, "Failed to render template");
        assert_eq!(err.internal_details(), Some("template not found: foo/bar"));
    }
}
