//! Path resolution and controller dispatch
//!
//! Resolution runs in two tiers:
//!
//! 1. **Explicit maps** rewrite the path (see [`RouteMap`]). The rewritten
//!    path goes through the maps again, each entry firing at most once, for
//!    at most `max_map_depth` rewrites.
//! 2. **Positional decomposition** splits what is left on `/`:
//!
//! | Segments | Controller | Method | Params |
//! |----------|------------|--------|--------|
//! | 0 | default controller | default method | none |
//! | 1 | `seg[0]` | default method | none |
//! | 2+ | `seg[0]` | `seg[1]` | `seg[2..]` |
//!
//! Controller names are folded to `Foo` for lookup, methods to lowercase.
//! When the method is not callable the controller's `route` action is tried
//! with the original method segment as its only parameter.
//!
//! An unroutable path is not an error: [`Router::route`] returns
//! [`RouteOutcome::NotFound`] and clears [`Router::last_route`]. Errors
//! returned by actions propagate unchanged.
//!
//! # Example
//!
//! ```rust
//! use nanoportal_core::{AppContext, Controller, Outcome, Request, RequestType, Response, RouteOutcome, Router};
//!
//! let mut router = Router::new()
//!     .controller(Controller::new("foo").action("bar", |scope, params| {
//!         scope.set("id", &params[0]);
//!         Ok(Outcome::None)
//!     }))
//!     .map("show/*", "/foo/bar/*");
//!
//! let request = Request::for_path(RequestType::Get, "/show/456");
//! let mut response = Response::for_request(&request);
//! let outcome = router.route(&request, &AppContext::default(), &mut response).unwrap();
//!
//! assert!(matches!(outcome, RouteOutcome::Dispatched { .. }));
//! let route = router.last_route().unwrap();
//! assert_eq!((route.controller.as_str(), route.method.as_str()), ("foo", "bar"));
//! assert_eq!(route.params.as_slice(), ["456"]);
//! ```

use crate::config::PortalConfig;
use crate::context::AppContext;
use crate::controller::{controller_key, Controller, Scope, FALLBACK_ACTION};
use crate::error::Result;
use crate::output::{DataBag, Outcome};
use crate::request::{normalize_path, Request};
use crate::response::Response;
use crate::route_map::RouteMap;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Positional parameters of a resolved route
pub type RouteParams = SmallVec<[String; 4]>;

/// `{controller, method, params}` triple produced by resolution.
///
/// `controller` and `method` are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub controller: String,
    pub method: String,
    pub params: RouteParams,
}

impl fmt::Display for ResolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", controller_key(&self.controller), self.method)?;
        if !self.params.is_empty() {
            write!(f, "({})", self.params.join(", "))?;
        }
        Ok(())
    }
}

/// Result of [`Router::route`]
pub enum RouteOutcome {
    /// Nothing can handle the path
    NotFound,
    /// An action ran
    Dispatched {
        route: ResolvedRoute,
        outcome: Outcome,
        data: DataBag,
    },
}

impl fmt::Debug for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("NotFound"),
            Self::Dispatched { route, outcome, data } => f
                .debug_struct("Dispatched")
                .field("route", route)
                .field("outcome", outcome)
                .field("data", data)
                .finish(),
        }
    }
}

/// Decomposed path before controller lookup
struct Candidate {
    route: ResolvedRoute,
    /// Method segment as it appeared in the path
    raw_method: Option<String>,
}

/// Maps request paths to controller actions.
///
/// Cloning is cheap: controllers and maps are shared. Each clone has its own
/// [`last_route`](Self::last_route) slot.
#[derive(Clone)]
pub struct Router {
    controllers: Arc<HashMap<String, Controller>>,
    map: Arc<RouteMap>,
    default_controller: String,
    default_method: String,
    max_map_depth: usize,
    last_route: Option<ResolvedRoute>,
}

impl Router {
    /// Create a router with default settings
    pub fn new() -> Self {
        Self::with_config(&PortalConfig::default())
    }

    /// Create a router using the defaults and map bound from `config`
    pub fn with_config(config: &PortalConfig) -> Self {
        Self {
            controllers: Arc::new(HashMap::new()),
            map: Arc::new(RouteMap::new()),
            default_controller: config.default_controller.to_lowercase(),
            default_method: config.default_method.to_lowercase(),
            max_map_depth: config.max_map_depth,
            last_route: None,
        }
    }

    /// Register a controller.
    ///
    /// # Panics
    ///
    /// Panics if a controller with the same folded name exists.
    pub fn controller(mut self, controller: Controller) -> Self {
        let key = controller.name().to_string();
        let controllers = Arc::make_mut(&mut self.controllers);
        if controllers.contains_key(&key) {
            panic!("Duplicate controller `{}`", key);
        }
        controllers.insert(key, controller);
        self
    }

    /// Register an explicit map
    pub fn map(mut self, pattern: &str, target: &str) -> Self {
        Arc::make_mut(&mut self.map).map(pattern, target);
        self
    }

    /// Look up a controller by any casing of its name
    pub fn get_controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.get(&controller_key(name))
    }

    /// Explicit maps in registration order
    pub fn route_map(&self) -> &RouteMap {
        &self.map
    }

    /// The route resolved by the last [`route`](Self::route) call, or `None`
    /// if it was unroutable.
    pub fn last_route(&self) -> Option<&ResolvedRoute> {
        self.last_route.as_ref()
    }

    /// Apply maps and positional decomposition without touching controllers.
    ///
    /// `None` if the map chain exceeds `max_map_depth`.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        self.candidate(path).map(|candidate| candidate.route)
    }

    fn candidate(&self, path: &str) -> Option<Candidate> {
        let path = self.apply_maps(path)?;
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());

        let controller = segments
            .next()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.default_controller.clone());
        let raw_method = segments.next().map(str::to_string);
        let method = raw_method
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.default_method.clone());
        let params = segments.map(str::to_string).collect();

        Some(Candidate {
            route: ResolvedRoute {
                controller,
                method,
                params,
            },
            raw_method,
        })
    }

    fn apply_maps(&self, path: &str) -> Option<String> {
        let mut path = normalize_path(path);
        let mut fired: SmallVec<[usize; 4]> = SmallVec::new();

        while let Some((index, rewritten)) = self.map.apply_unfired(&path, &fired) {
            if fired.len() == self.max_map_depth {
                warn!(
                    path = %path,
                    max_map_depth = self.max_map_depth,
                    "Route map chain too deep; treating as unroutable"
                );
                return None;
            }
            debug!(from = %path, to = %rewritten, "Route map applied");
            fired.push(index);
            path = rewritten;
        }
        Some(path)
    }

    /// Resolve the request's path and invoke the matching action.
    ///
    /// On a match the response code is set to 200 before the action runs;
    /// the action may change it.
    pub fn route(
        &mut self,
        request: &Request,
        ctx: &AppContext,
        response: &mut Response,
    ) -> Result<RouteOutcome> {
        self.last_route = None;

        let Some(Candidate { mut route, raw_method }) = self.candidate(request.path()) else {
            return Ok(RouteOutcome::NotFound);
        };

        let Some(controller) = self.controllers.get(&controller_key(&route.controller)) else {
            debug!(path = %request.path(), controller = %route.controller, "No such controller");
            return Ok(RouteOutcome::NotFound);
        };

        if !controller.has_action(&route.method) {
            if !controller.has_action(FALLBACK_ACTION) {
                debug!(
                    path = %request.path(),
                    controller = %route.controller,
                    method = %route.method,
                    "No such action"
                );
                return Ok(RouteOutcome::NotFound);
            }
            route.method = FALLBACK_ACTION.to_string();
            route.params = raw_method.into_iter().collect();
        }

        debug!(
            controller = %route.controller,
            method = %route.method,
            params = ?route.params,
            "Dispatching"
        );
        self.last_route = Some(route.clone());
        response.set_response_code(200);

        let mut scope = Scope::new(request, ctx, response);
        let outcome = match controller.dispatch(&route.method, &mut scope, &route.params) {
            Some(result) => result?,
            None => return Ok(RouteOutcome::NotFound),
        };

        Ok(RouteOutcome::Dispatched {
            route,
            outcome,
            data: scope.into_data(),
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut controllers: Vec<&String> = self.controllers.keys().collect();
        controllers.sort();
        f.debug_struct("Router")
            .field("controllers", &controllers)
            .field("map", &self.map.entries())
            .field("default_controller", &self.default_controller)
            .field("default_method", &self.default_method)
            .field("last_route", &self.last_route)
            .finish()
    }
}
