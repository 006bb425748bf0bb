//! Controllers and the actions they expose
//!
//! A controller is a named set of actions. Each action is a closure taking a
//! [`Scope`] and the positional parameters left over after routing:
//!
//! ```rust
//! use nanoportal_core::{Controller, Outcome};
//!
//! let foo = Controller::new("foo")
//!     .action("bar", |scope, params| {
//!         let id = params.first().cloned().unwrap_or_default();
//!         scope.set("id", id);
//!         Ok(Outcome::None)
//!     })
//!     .action("route", |_scope, params| {
//!         // Catch-all for /foo/<anything>
//!         Outcome::data(&params)
//!     });
//!
//! assert!(foo.has_action("bar"));
//! assert!(!foo.has_action("baz"));
//! ```

use crate::context::AppContext;
use crate::error::Result;
use crate::output::{DataBag, Outcome};
use crate::request::Request;
use crate::response::Response;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Boxed action callable
pub type Action = Arc<dyn Fn(&mut Scope<'_>, &[String]) -> Result<Outcome> + Send + Sync>;

/// Names reserved for controller lifecycle hooks; never routable.
pub const RESERVED_ACTIONS: &[&str] = &["init", "get", "set", "render", "service"];

/// Action invoked when the resolved one does not exist.
pub const FALLBACK_ACTION: &str = "route";

/// Whether an action name may be reached from a URL.
pub fn is_routable_action(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('_') && !RESERVED_ACTIONS.contains(&name)
}

/// Registry key for a controller: one uppercase letter, the rest lowercase.
pub fn controller_key(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A named set of routable actions.
#[derive(Clone)]
pub struct Controller {
    name: String,
    actions: HashMap<String, Action>,
}

impl Controller {
    /// Create a controller. The name is case-folded (`foo` → `Foo`).
    pub fn new(name: &str) -> Self {
        Self {
            name: controller_key(name),
            actions: HashMap::new(),
        }
    }

    /// Register an action. Names are lowercased.
    ///
    /// # Panics
    ///
    /// Panics if the name is reserved, starts with `_`, or was already
    /// registered on this controller.
    pub fn action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &[String]) -> Result<Outcome> + Send + Sync + 'static,
    {
        let name = name.to_lowercase();
        if !is_routable_action(&name) {
            panic!(
                "Action `{}` on controller `{}` is not routable (reserved or `_`-prefixed)",
                name, self.name
            );
        }
        if self.actions.contains_key(&name) {
            panic!("Duplicate action `{}` on controller `{}`", name, self.name);
        }
        self.actions.insert(name, Arc::new(action));
        self
    }

    /// Case-folded controller name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `name` resolves to a callable action
    pub fn has_action(&self, name: &str) -> bool {
        is_routable_action(name) && self.actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke an action by name. `None` if it is not callable.
    pub fn dispatch(
        &self,
        name: &str,
        scope: &mut Scope<'_>,
        params: &[String],
    ) -> Option<Result<Outcome>> {
        if !is_routable_action(name) {
            return None;
        }
        let action = self.actions.get(name)?;
        Some(action(scope, params))
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("actions", &self.actions())
            .finish()
    }
}

/// What an action can see and touch during one invocation.
pub struct Scope<'a> {
    request: &'a Request,
    ctx: &'a AppContext,
    response: &'a mut Response,
    data: DataBag,
}

impl<'a> Scope<'a> {
    /// Create a scope with an empty data bag
    pub fn new(request: &'a Request, ctx: &'a AppContext, response: &'a mut Response) -> Self {
        Self {
            request,
            ctx,
            response,
            data: DataBag::new(),
        }
    }

    /// The request being handled
    pub fn request(&self) -> &Request {
        self.request
    }

    /// Application context
    pub fn ctx(&self) -> &AppContext {
        self.ctx
    }

    /// The response under construction
    pub fn response(&mut self) -> &mut Response {
        self.response
    }

    /// Store a value for the template
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        self.data.set(key, value);
    }

    /// Read a value stored for the template
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Data bag
    pub fn data(&self) -> &DataBag {
        &self.data
    }

    /// Mutable data bag
    pub fn data_mut(&mut self) -> &mut DataBag {
        &mut self.data
    }

    /// Look up a named service from the context
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.ctx.service(name)
    }

    /// Consume the scope, keeping the data bag
    pub fn into_data(self) -> DataBag {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestType;
    use serde_json::json;

    fn echo() -> Controller {
        Controller::new("ECHO")
            .action("Say", |scope, params| {
                scope.set("said", params.join(" "));
                Ok(Outcome::None)
            })
            .action("route", |_scope, params| Outcome::data(&params))
    }

    #[test]
    fn test_controller_key() {
        assert_eq!(controller_key("foo"), "Foo");
        assert_eq!(controller_key("FOO"), "Foo");
        assert_eq!(controller_key("fOo"), "Foo");
        assert_eq!(controller_key(""), "");
    }

    #[test]
    fn test_routable_names() {
        assert!(is_routable_action("index"));
        assert!(!is_routable_action("_private"));
        assert!(!is_routable_action(""));
        for reserved in RESERVED_ACTIONS {
            assert!(!is_routable_action(reserved));
        }
    }

    #[test]
    fn test_names_are_folded() {
        let controller = echo();
        assert_eq!(controller.name(), "Echo");
        assert_eq!(controller.actions(), vec!["route", "say"]);
        assert!(controller.has_action("say"));
        assert!(!controller.has_action("Say"));
    }

    #[test]
    fn test_dispatch() {
        let controller = echo();
        let request = Request::for_path(RequestType::Get, "/echo/say/a/b");
        let ctx = AppContext::default();
        let mut response = Response::new();
        let mut scope = Scope::new(&request, &ctx, &mut response);

        let params = vec!["a".to_string(), "b".to_string()];
        let outcome = controller.dispatch("say", &mut scope, &params).unwrap().unwrap();
        assert!(matches!(outcome, Outcome::None));
        assert_eq!(scope.get("said"), Some(&json!("a b")));

        assert!(controller.dispatch("missing", &mut scope, &params).is_none());
        assert!(controller.dispatch("init", &mut scope, &params).is_none());
    }

    #[test]
    fn test_scope_services_and_response() {
        let mut ctx = AppContext::default();
        ctx.register("greeting", "hello".to_string());
        let request = Request::for_path(RequestType::Get, "/");
        let mut response = Response::new();

        let mut scope = Scope::new(&request, &ctx, &mut response);
        assert_eq!(scope.service::<String>("greeting").as_deref().map(String::as_str), Some("hello"));
        scope.response().set_etag("v1");
        scope.set("k", 1);
        let data = scope.into_data();

        assert_eq!(data.get("k"), Some(&json!(1)));
        assert_eq!(response.etag(), Some("v1"));
    }

    #[test]
    #[should_panic(expected = "not routable")]
    fn test_underscore_action_panics() {
        let _ = Controller::new("foo").action("_secret", |_, _| Ok(Outcome::None));
    }

    #[test]
    #[should_panic(expected = "not routable")]
    fn test_reserved_action_panics() {
        let _ = Controller::new("foo").action("Render", |_, _| Ok(Outcome::None));
    }

    #[test]
    #[should_panic(expected = "Duplicate action")]
    fn test_duplicate_action_panics() {
        let _ = Controller::new("foo")
            .action("bar", |_, _| Ok(Outcome::None))
            .action("BAR", |_, _| Ok(Outcome::None));
    }
}
