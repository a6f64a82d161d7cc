use futures::FutureExt;
use futures::future::BoxFuture;
use sonic_rs::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::error::{AppError, Result};
use crate::models::envelope::{Envelope, Reply, Request};

/// A registered API handler.
type BoxedHandler<S> = Box<dyn Fn(S, Value) -> BoxFuture<'static, Result<Reply>> + Send + Sync>;

/// Collects routes during startup wiring.
pub struct RouteTableBuilder<S> {
    routes: HashMap<&'static str, BoxedHandler<S>>,
}

impl<S> Default for RouteTableBuilder<S> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<S> RouteTableBuilder<S>
where
    S: Send + 'static,
{
    /// Registers `handler` under a dotted API name.
    ///
    /// # Arguments
    ///
    /// * `api` - The API name, e.g. `patient.auth.login`.
    /// * `handler` - An async function from state and payload to a reply.
    ///
    /// # Returns
    ///
    /// The builder, or `DuplicateRoute` if the name is already taken.
    pub fn register<F, Fut>(mut self, api: &'static str, handler: F) -> Result<Self>
    where
        F: Fn(S, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        if self.routes.contains_key(api) {
            return Err(AppError::DuplicateRoute(api.to_string()));
        }
        self.routes
            .insert(api, Box::new(move |state, data| handler(state, data).boxed()));
        Ok(self)
    }

    /// Freezes the table.
    pub fn build(self) -> Dispatcher<S> {
        tracing::info!("✅ Route table built with {} APIs", self.routes.len());
        Dispatcher {
            routes: self.routes,
        }
    }
}

/// Routes decoded request envelopes to their handlers.
///
/// The route table is immutable once built. Every input yields a
/// well-formed response envelope: decode failures, unknown routes, handler
/// errors and handler panics all become error envelopes.
pub struct Dispatcher<S> {
    routes: HashMap<&'static str, BoxedHandler<S>>,
}

impl<S> Dispatcher<S>
where
    S: Send + 'static,
{
    pub fn builder() -> RouteTableBuilder<S> {
        RouteTableBuilder::default()
    }

    pub fn contains(&self, api: &str) -> bool {
        self.routes.contains_key(api)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered API names, sorted.
    pub fn apis(&self) -> Vec<&'static str> {
        let mut apis: Vec<_> = self.routes.keys().copied().collect();
        apis.sort_unstable();
        apis
    }

    /// Decodes, routes and runs one request.
    pub async fn dispatch_envelope(&self, state: S, raw: &str) -> Envelope {
        let request = match Request::decode(raw) {
            Ok(request) => request,
            Err(e) => return e.into_envelope(),
        };

        let Some(handler) = self.routes.get(request.api.as_str()) else {
            return AppError::RouteNotFound(request.api).into_envelope();
        };

        let Request { api, data } = request;
        let outcome = AssertUnwindSafe(async move { handler(state, data).await })
            .catch_unwind()
            .await;

        let envelope = match outcome {
            Ok(Ok(reply)) => reply.into_envelope(),
            Ok(Err(e)) => e.into_envelope(),
            Err(panic) => {
                tracing::error!("❌ Handler for {} panicked: {}", api, panic_message(&*panic));
                AppError::Internal(format!("handler for {} panicked", api)).into_envelope()
            }
        };

        tracing::info!(
            "[API] {} - Status: {} - Code: {}",
            api,
            envelope.status.as_str(),
            envelope.code
        );
        envelope
    }

    /// Like `dispatch_envelope`, returning the encoded response.
    pub async fn dispatch(&self, state: S, raw: &str) -> String {
        self.dispatch_envelope(state, raw).await.encode()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
