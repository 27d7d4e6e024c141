use crate::handler::Handler;
use hyper::Method;
use std::sync::Arc;

#[derive(Clone)]
pub struct Route {
    pub path: String,
    handlers: Vec<(Method, Arc<dyn Handler>)>,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handlers: Vec::new(),
        }
    }

    /// Later registrations for the same method replace earlier ones.
    pub fn add(&mut self, method: Method, handler: Arc<dyn Handler>) {
        match self.handlers.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((method, handler)),
        }
    }

    pub fn handler_for(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.handlers
            .iter()
            .find(|(m, _)| m == method)
            .or_else(|| {
                // HEAD falls back to GET
                (*method == Method::HEAD)
                    .then(|| self.handlers.iter().find(|(m, _)| *m == Method::GET))
                    .flatten()
            })
            .map(|(_, h)| h)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.handlers.iter().map(|(m, _)| m)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods().collect::<Vec<_>>())
            .finish()
    }
}
