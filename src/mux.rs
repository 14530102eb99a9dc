use crate::callmeta::MethodInfo;
use crate::constants::DEFAULT_ROUTE;
use crate::context::Context;
use crate::interceptor::{UnaryHandler, UnaryServerInterceptor};
use crate::message::BoxMessage;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tonic::Status;
use tracing::trace;

/// Routes unary calls to an interceptor by exact route.
///
/// Lookup tries the call's full route, then the [`DEFAULT_ROUTE`] entry. With
/// neither present the handler is called directly.
///
/// # Example
///
/// ```rust
/// use grpc_interceptors::{unary_server_fn, Mux};
/// use std::sync::Arc;
///
/// let audit = Arc::new(unary_server_fn(|ctx, req, _info, next| async move {
///     next.call(ctx, req).await
/// }));
///
/// let mux = Mux::new()
///     .route("/pkg.Accounts/Delete", audit.clone())
///     .default_route(audit);
/// # drop(mux);
/// ```
#[derive(Clone, Default)]
pub struct Mux {
    routes: HashMap<String, Arc<dyn UnaryServerInterceptor>>,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `interceptor` for calls to exactly `full_method`.
    pub fn route(
        mut self,
        full_method: impl Into<String>,
        interceptor: Arc<dyn UnaryServerInterceptor>,
    ) -> Self {
        self.routes.insert(full_method.into(), interceptor);
        self
    }

    /// Registers the interceptor for calls no other route matches.
    pub fn default_route(self, interceptor: Arc<dyn UnaryServerInterceptor>) -> Self {
        self.route(DEFAULT_ROUTE, interceptor)
    }

    fn lookup(&self, full_method: &str) -> Option<&Arc<dyn UnaryServerInterceptor>> {
        self.routes
            .get(full_method)
            .or_else(|| self.routes.get(DEFAULT_ROUTE))
    }
}

impl From<HashMap<String, Arc<dyn UnaryServerInterceptor>>> for Mux {
    fn from(routes: HashMap<String, Arc<dyn UnaryServerInterceptor>>) -> Self {
        Self { routes }
    }
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self.routes.keys().collect();
        routes.sort();
        f.debug_struct("Mux").field("routes", &routes).finish()
    }
}

#[tonic::async_trait]
impl UnaryServerInterceptor for Mux {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        match self.lookup(info.full_method()) {
            Some(interceptor) => interceptor.intercept(ctx, req, info, next).await,
            None => {
                trace!(route = %info.full_method(), "no interceptor routed");
                next.call(ctx, req).await
            }
        }
    }
}
