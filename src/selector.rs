//! Apply an interceptor only to the calls a [`Decider`] selects.

use crate::callmeta::{CallMeta, MethodInfo};
use crate::constants::HEALTH_SERVICE;
use crate::context::Context;
use crate::interceptor::{
    StreamClientInterceptor, StreamHandler, StreamServerInterceptor, Streamer,
    UnaryClientInterceptor, UnaryHandler, UnaryInvoker, UnaryServerInterceptor,
};
use crate::message::BoxMessage;
use crate::reporter::Decider;
use crate::stream::{BoxClientStream, BoxServerStream};
use tonic::Status;

/// Runs `interceptor` for selected calls and calls straight through otherwise.
///
/// Works for every interceptor shape the wrapped interceptor implements.
///
/// # Example
///
/// ```rust
/// use grpc_interceptors::{all_but_health, unary_server_fn, Selector};
///
/// let noisy = unary_server_fn(|ctx, req, _info, next| async move {
///     tracing::info!("intercepted");
///     next.call(ctx, req).await
/// });
/// let quiet_on_health = Selector::new(noisy, all_but_health);
/// # drop(quiet_on_health);
/// ```
#[derive(Debug, Clone)]
pub struct Selector<I, D> {
    interceptor: I,
    decider: D,
}

impl<I, D: Decider> Selector<I, D> {
    pub fn new(interceptor: I, decider: D) -> Self {
        Self {
            interceptor,
            decider,
        }
    }
}

/// Selects every call except those to the standard health service.
pub fn all_but_health(_ctx: &Context, meta: &CallMeta) -> bool {
    meta.service != HEALTH_SERVICE
}

#[tonic::async_trait]
impl<I, D> UnaryServerInterceptor for Selector<I, D>
where
    I: UnaryServerInterceptor,
    D: Decider,
{
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        if self.decider.decide(&ctx, &CallMeta::server(info)) {
            self.interceptor.intercept(ctx, req, info, next).await
        } else {
            next.call(ctx, req).await
        }
    }
}

#[tonic::async_trait]
impl<I, D> StreamServerInterceptor for Selector<I, D>
where
    I: StreamServerInterceptor,
    D: Decider,
{
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        next: StreamHandler,
    ) -> Result<(), Status> {
        if self.decider.decide(&stream.context(), &CallMeta::server(info)) {
            self.interceptor.intercept(stream, info, next).await
        } else {
            next.call(stream).await
        }
    }
}

#[tonic::async_trait]
impl<I, D> UnaryClientInterceptor for Selector<I, D>
where
    I: UnaryClientInterceptor,
    D: Decider,
{
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryInvoker,
    ) -> Result<BoxMessage, Status> {
        if self.decider.decide(&ctx, &CallMeta::client(info)) {
            self.interceptor.intercept(ctx, req, info, next).await
        } else {
            next.call(ctx, req).await
        }
    }
}

#[tonic::async_trait]
impl<I, D> StreamClientInterceptor for Selector<I, D>
where
    I: StreamClientInterceptor,
    D: Decider,
{
    async fn intercept(
        &self,
        ctx: Context,
        info: &MethodInfo,
        next: Streamer,
    ) -> Result<BoxClientStream, Status> {
        if self.decider.decide(&ctx, &CallMeta::client(info)) {
            self.interceptor.intercept(ctx, info, next).await
        } else {
            next.call(ctx).await
        }
    }
}
