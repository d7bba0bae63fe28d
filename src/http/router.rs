//! Exact-match routing table.
//!
//! The table maps a `(method, path)` pair to a [`Hook`]. There are no
//! wildcards and no path parameters; a request that misses the table simply
//! carries no hook and falls through to static content.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::http::request::{Method, Request};
use crate::http::response::Response;

type HandlerFn = dyn Fn(&Request) -> Response + Send + Sync;

/// A handler registered against one exact method and path.
///
/// Hooks are reference counted so a request can carry one cheaply. Two hooks
/// compare equal only if they are the same registration.
#[derive(Clone)]
pub struct Hook {
    name: Arc<str>,
    handler: Arc<HandlerFn>,
}

impl Hook {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, request: &Request) -> Response {
        (self.handler)(request)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: HashMap<(Method, String), Hook>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` + `path`, replacing any previous hook.
    pub fn route<F>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let path = path.into();
        let hook = Hook::new(format!("{} {}", method, path), handler);
        self.routes.insert((method, path), hook);
        self
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<Hook> {
        self.routes
            .get(&(method.clone(), path.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        let router = Router::new().route(Method::PUT, "/hello", |_| Response::ok("hi"));

        assert!(router.lookup(&Method::PUT, "/hello").is_some());
        assert!(router.lookup(&Method::GET, "/hello").is_none());
        assert!(router.lookup(&Method::PUT, "/hello/").is_none());
    }
}
