//! Server-side authentication interceptors.
//!
//! An [`AuthFn`] inspects the call context (usually the incoming metadata) and
//! either rejects the call or returns the context the handler should see, for
//! example with the authenticated principal added.

use crate::callmeta::{CallMeta, MethodInfo};
use crate::constants::AUTHORIZATION_HEADER;
use crate::context::Context;
use crate::error::InterceptorError;
use crate::interceptor::{
    StreamHandler, StreamServerInterceptor, UnaryHandler, UnaryServerInterceptor,
};
use crate::message::BoxMessage;
use crate::stream::{with_stream_context, BoxServerStream};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tonic::Status;
use tracing::debug;

/// Authenticates a call from its context.
///
/// Implemented for any `Fn(Context) -> impl Future<Output = Result<Context, Status>>`.
#[tonic::async_trait]
pub trait AuthFn: Send + Sync + 'static {
    async fn authenticate(&self, ctx: Context) -> Result<Context, Status>;
}

#[tonic::async_trait]
impl<F, Fut> AuthFn for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, Status>> + Send + 'static,
{
    async fn authenticate(&self, ctx: Context) -> Result<Context, Status> {
        self(ctx).await
    }
}

/// Runs an [`AuthFn`] before every unary and streaming server call.
///
/// Services registered with [`AuthInterceptor::with_override`] are checked by
/// their own function instead of the default one.
///
/// # Example
///
/// ```rust
/// use grpc_interceptors::{auth_from_metadata, AuthInterceptor, Context};
/// use tonic::Status;
///
/// #[derive(Debug)]
/// struct Token(String);
///
/// let auth = AuthInterceptor::new(|ctx: Context| async move {
///     let token = auth_from_metadata(&ctx, "bearer")?;
///     Ok::<_, Status>(ctx.with_value(Token(token)))
/// })
/// .with_override("grpc.health.v1.Health", |ctx: Context| async move {
///     Ok::<_, Status>(ctx)
/// });
/// # drop(auth);
/// ```
#[derive(Clone)]
pub struct AuthInterceptor {
    default: Arc<dyn AuthFn>,
    overrides: HashMap<String, Arc<dyn AuthFn>>,
}

impl AuthInterceptor {
    pub fn new(auth: impl AuthFn) -> Self {
        Self {
            default: Arc::new(auth),
            overrides: HashMap::new(),
        }
    }

    /// Authenticates calls to `service` (e.g. `pkg.Users`) with `auth`.
    pub fn with_override(mut self, service: impl Into<String>, auth: impl AuthFn) -> Self {
        self.overrides.insert(service.into(), Arc::new(auth));
        self
    }

    async fn authenticate(&self, ctx: Context, info: &MethodInfo) -> Result<Context, Status> {
        let meta = CallMeta::server(info);
        let auth = self.overrides.get(&meta.service).unwrap_or(&self.default);
        let result = auth.authenticate(ctx).await;
        if let Err(status) = &result {
            debug!(
                grpc.service = %meta.service,
                grpc.method = %meta.method,
                grpc.code = ?status.code(),
                "authentication failed"
            );
        }
        result
    }
}

impl fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<_> = self.overrides.keys().collect();
        services.sort();
        f.debug_struct("AuthInterceptor")
            .field("overrides", &services)
            .finish()
    }
}

#[tonic::async_trait]
impl UnaryServerInterceptor for AuthInterceptor {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        let ctx = self.authenticate(ctx, info).await?;
        next.call(ctx, req).await
    }
}

#[tonic::async_trait]
impl StreamServerInterceptor for AuthInterceptor {
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        next: StreamHandler,
    ) -> Result<(), Status> {
        let ctx = self.authenticate(stream.context(), info).await?;
        next.call(with_stream_context(stream, ctx)).await
    }
}

/// Returns the credential from the `authorization` header of the incoming
/// metadata, provided it uses `scheme` (matched case-insensitively).
///
/// Fails with `Unauthenticated` when the header is missing, malformed or uses
/// another scheme.
pub fn auth_from_metadata(ctx: &Context, scheme: &str) -> Result<String, Status> {
    let unauthenticated = || {
        InterceptorError::Unauthenticated(format!("Request unauthenticated with {scheme}"))
    };

    let value = ctx
        .incoming_metadata()
        .and_then(|md| md.get(AUTHORIZATION_HEADER))
        .ok_or_else(unauthenticated)?;
    let value = value
        .to_str()
        .map_err(|_| InterceptorError::Unauthenticated("Bad authorization string".into()))?;

    let (given, credential) = value
        .split_once(' ')
        .ok_or_else(|| InterceptorError::Unauthenticated("Bad authorization string".into()))?;
    if !given.eq_ignore_ascii_case(scheme) {
        return Err(unauthenticated().into());
    }
    Ok(credential.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ServerStream;
    use crate::testing::{text, MockServerStream};
    use tokio_test::assert_err;
    use tonic::metadata::MetadataMap;
    use tonic::Code;

    #[derive(Debug, Clone, PartialEq)]
    struct Principal(String);

    fn with_auth(value: &str) -> Context {
        let mut md = MetadataMap::new();
        md.insert(AUTHORIZATION_HEADER, value.parse().unwrap());
        Context::new().with_incoming_metadata(md)
    }

    fn bearer_auth() -> AuthInterceptor {
        AuthInterceptor::new(|ctx: Context| async move {
            let token = auth_from_metadata(&ctx, "bearer")?;
            if token != "s3cret" {
                return Err(Status::unauthenticated("invalid token"));
            }
            Ok::<_, Status>(ctx.with_value(Principal("alice".into())))
        })
    }

    async fn call_unary(
        auth: &AuthInterceptor,
        ctx: Context,
        info: &MethodInfo,
    ) -> Result<String, Status> {
        let handler = UnaryHandler::new(|ctx: Context, _req| async move {
            let who = ctx.value::<Principal>().map(|p| p.0.clone());
            Ok(text(&who.unwrap_or_default()))
        });
        let resp = UnaryServerInterceptor::intercept(auth, ctx, text("req"), info, handler).await?;
        Ok(resp.downcast::<String>().unwrap())
    }

    #[test]
    fn reads_credential_for_scheme() {
        assert_eq!(auth_from_metadata(&with_auth("Bearer abc"), "bearer").unwrap(), "abc");
        assert_eq!(auth_from_metadata(&with_auth("bAsIc xyz"), "Basic").unwrap(), "xyz");
    }

    #[test]
    fn rejects_missing_or_foreign_credentials() {
        let status = assert_err!(auth_from_metadata(&Context::new(), "bearer"));
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(status.message(), "Request unauthenticated with bearer");

        let status = assert_err!(auth_from_metadata(&with_auth("Basic abc"), "bearer"));
        assert_eq!(status.code(), Code::Unauthenticated);

        let status = assert_err!(auth_from_metadata(&with_auth("token"), "bearer"));
        assert_eq!(status.message(), "Bad authorization string");
    }

    #[tokio::test]
    async fn unary_calls_see_authenticated_context() {
        let auth = bearer_auth();
        let info = MethodInfo::unary("/pkg.Users/Get");

        let who = call_unary(&auth, with_auth("Bearer s3cret"), &info).await;
        assert_eq!(who.unwrap(), "alice");

        let status = assert_err!(call_unary(&auth, with_auth("Bearer nope"), &info).await);
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn service_override_replaces_default() {
        let auth = bearer_auth().with_override("grpc.health.v1.Health", |ctx: Context| async move {
            Ok::<_, Status>(ctx.with_value(Principal("anonymous".into())))
        });
        let info = MethodInfo::unary("/grpc.health.v1.Health/Check");

        let who = call_unary(&auth, Context::new(), &info).await;
        assert_eq!(who.unwrap(), "anonymous");
    }

    #[tokio::test]
    async fn stream_handler_sees_authenticated_context() {
        let auth = bearer_auth();
        let mock = MockServerStream {
            ctx: with_auth("bearer s3cret"),
            ..Default::default()
        };
        let handler = StreamHandler::new(|stream: BoxServerStream| async move {
            let principal = stream.context().value::<Principal>().cloned();
            assert_eq!(principal, Some(Principal("alice".into())));
            Ok(())
        });

        let info = MethodInfo::streaming("/pkg.Feed/Watch", false, true);
        StreamServerInterceptor::intercept(&auth, Box::new(mock), &info, handler)
            .await
            .unwrap();

        let rejected = StreamHandler::new(|_stream| async move { Ok(()) });
        let status = assert_err!(
            StreamServerInterceptor::intercept(
                &auth,
                Box::new(MockServerStream::default()),
                &info,
                rejected
            )
            .await
        );
        assert_eq!(status.code(), Code::Unauthenticated);
    }
}
