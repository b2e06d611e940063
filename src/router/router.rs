//! Route registry and lookup.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::dispatch::{BodyHandler, BodylessHandler, Capability};
use crate::parser::{HttpRequest, Method};
use crate::router::template::{PathTemplate, TemplateError};

/// Parameters extracted from a matched request.
#[derive(Debug, Clone, Default)]
pub struct MatchedComponents {
    /// Placeholder bindings from the matched template, e.g. `{id}` → `"123"`.
    pub path_params: HashMap<String, String>,
    /// Query parameters in original order; duplicate names are preserved.
    pub query_params: Vec<(String, String)>,
}

/// Errors that can occur during route registration.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The path template failed to parse.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A structurally identical `(verb, template)` pair is already registered.
    #[error("Route already registered: {verb} {template}")]
    DuplicateRoute { verb: Method, template: String },
}

struct Route {
    verb: Method,
    template: PathTemplate,
    capability: Capability,
}

/// Registry of `(verb, template)` → handler capability.
///
/// Routes are registered at setup time; lookups are pure reads, so a router
/// moved into a [`Coordinator`](crate::dispatch::Coordinator) can serve
/// concurrent requests without synchronization.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a bodyless handler under `verb` and `template`.
    ///
    /// The handler's parameter type is fixed here, at registration; dispatch
    /// never inspects types at run time.
    pub fn add_bodyless<H: BodylessHandler>(
        &mut self,
        verb: Method,
        template: &str,
        handler: H,
    ) -> Result<(), RouterError> {
        let template: PathTemplate = template.parse()?;
        self.insert(verb, template, Capability::bodyless(handler))
    }

    /// Register a body-consuming handler under `verb` and `template`.
    pub fn add_with_body<H: BodyHandler>(
        &mut self,
        verb: Method,
        template: &str,
        handler: H,
    ) -> Result<(), RouterError> {
        let template: PathTemplate = template.parse()?;
        self.insert(verb, template, Capability::with_body(handler))
    }

    fn insert(
        &mut self,
        verb: Method,
        template: PathTemplate,
        capability: Capability,
    ) -> Result<(), RouterError> {
        // Structural duplicates are rejected: placeholder names don't
        // disambiguate two templates that match the same paths.
        if self
            .routes
            .iter()
            .any(|r| r.verb == verb && r.template.same_shape(&template))
        {
            return Err(RouterError::DuplicateRoute {
                verb,
                template: template.to_string(),
            });
        }

        debug!("Registered route: {verb} {template}");
        self.routes.push(Route {
            verb,
            template,
            capability,
        });
        Ok(())
    }

    /// Look up the first route matching the request's verb and path, in
    /// registration order.
    pub fn route(&self, request: &HttpRequest) -> Option<(MatchedComponents, &Capability)> {
        self.routes.iter().find_map(|route| {
            if route.verb != request.method {
                return None;
            }
            route.template.matches(&request.path).map(|path_params| {
                (
                    MatchedComponents {
                        path_params,
                        query_params: request.query_params.clone(),
                    },
                    &route.capability,
                )
            })
        })
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// true if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered `(verb, template)` pairs, in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = (Method, String)> + '_ {
        self.routes
            .iter()
            .map(|r| (r.verb, r.template.to_string()))
    }
}
