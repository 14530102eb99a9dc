use crate::callmeta::MethodInfo;
use crate::context::Context;
use crate::error::InterceptorError;
use crate::message::{BoxMessage, Message};
use crate::stream::{BoxClientStream, BoxServerStream};
use std::future::Future;
use std::pin::Pin;
use tonic::Status;

/// Boxed, sendable future used by the continuation types.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type UnaryFn =
    Box<dyn FnOnce(Context, BoxMessage) -> BoxFuture<'static, Result<BoxMessage, Status>> + Send>;

/// Remainder of a unary server chain, ending in the method handler.
///
/// [`call`](UnaryHandler::call) consumes the handler, so an interceptor can
/// continue a call at most once. Dropping it without calling short-circuits
/// the call.
pub struct UnaryHandler {
    f: UnaryFn,
}

impl UnaryHandler {
    /// Handler over type-erased messages.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Context, BoxMessage) -> Fut + Send + 'static,
        Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
    {
        let f: UnaryFn = Box::new(
            move |ctx: Context, req: BoxMessage| -> BoxFuture<'static, Result<BoxMessage, Status>> {
                Box::pin(f(ctx, req))
            },
        );
        Self { f }
    }

    /// Builds a handler from a function over concrete message types.
    ///
    /// A request of any other type fails the call with `Internal`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use grpc_interceptors::{Context, UnaryHandler};
    /// use tonic::Status;
    ///
    /// let handler = UnaryHandler::typed(|_ctx: Context, name: String| async move {
    ///     Ok::<_, Status>(format!("hello {name}"))
    /// });
    /// # drop(handler);
    /// ```
    pub fn typed<Req, Resp, F, Fut>(f: F) -> Self
    where
        Req: Message,
        Resp: Message,
        F: FnOnce(Context, Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        Self::new(move |ctx, req| call_typed(f, ctx, req))
    }

    pub async fn call(self, ctx: Context, req: BoxMessage) -> Result<BoxMessage, Status> {
        (self.f)(ctx, req).await
    }
}

async fn call_typed<Req, Resp, F, Fut>(
    f: F,
    ctx: Context,
    req: BoxMessage,
) -> Result<BoxMessage, Status>
where
    Req: Message,
    Resp: Message,
    F: FnOnce(Context, Req) -> Fut,
    Fut: Future<Output = Result<Resp, Status>>,
{
    let req = req.downcast::<Req>().ok_or(InterceptorError::UnexpectedMessage {
        expected: std::any::type_name::<Req>(),
    })?;
    let resp = f(ctx, req).await?;
    Ok(Box::new(resp))
}

/// Remainder of a unary client chain, ending in the transport invoker.
pub struct UnaryInvoker {
    f: UnaryFn,
}

impl UnaryInvoker {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Context, BoxMessage) -> Fut + Send + 'static,
        Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
    {
        Self {
            f: UnaryHandler::new(f).f,
        }
    }

    pub async fn call(self, ctx: Context, req: BoxMessage) -> Result<BoxMessage, Status> {
        (self.f)(ctx, req).await
    }
}

type StreamFn = Box<dyn FnOnce(BoxServerStream) -> BoxFuture<'static, Result<(), Status>> + Send>;

/// Remainder of a streaming server chain, ending in the method handler.
pub struct StreamHandler {
    f: StreamFn,
}

impl StreamHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(BoxServerStream) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
    {
        let f: StreamFn = Box::new(
            move |stream: BoxServerStream| -> BoxFuture<'static, Result<(), Status>> {
                Box::pin(f(stream))
            },
        );
        Self { f }
    }

    pub async fn call(self, stream: BoxServerStream) -> Result<(), Status> {
        (self.f)(stream).await
    }
}

type StreamerFn =
    Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<BoxClientStream, Status>> + Send>;

/// Remainder of a streaming client chain; opens the stream on the transport.
pub struct Streamer {
    f: StreamerFn,
}

impl Streamer {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<BoxClientStream, Status>> + Send + 'static,
    {
        let f: StreamerFn = Box::new(
            move |ctx: Context| -> BoxFuture<'static, Result<BoxClientStream, Status>> {
                Box::pin(f(ctx))
            },
        );
        Self { f }
    }

    pub async fn call(self, ctx: Context) -> Result<BoxClientStream, Status> {
        (self.f)(ctx).await
    }
}

/// Intercepts unary calls served by this process.
#[tonic::async_trait]
pub trait UnaryServerInterceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status>;
}

/// Intercepts streaming calls served by this process.
///
/// To change the context the handler sees, pass the stream through
/// [`crate::with_stream_context`] before calling `next`.
#[tonic::async_trait]
pub trait StreamServerInterceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        next: StreamHandler,
    ) -> Result<(), Status>;
}

/// Intercepts unary calls made by this process.
#[tonic::async_trait]
pub trait UnaryClientInterceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryInvoker,
    ) -> Result<BoxMessage, Status>;
}

/// Intercepts streaming calls made by this process.
#[tonic::async_trait]
pub trait StreamClientInterceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        ctx: Context,
        info: &MethodInfo,
        next: Streamer,
    ) -> Result<BoxClientStream, Status>;
}

/// Interceptor backed by a closure; see [`unary_server_fn`] and friends.
#[derive(Clone)]
pub struct InterceptorFn<F> {
    f: F,
}

/// Adapts a closure into a [`UnaryServerInterceptor`].
///
/// # Example
///
/// ```rust
/// use grpc_interceptors::{unary_server_fn, Context};
///
/// #[derive(Debug)]
/// struct Audited;
///
/// let audit = unary_server_fn(|ctx: Context, req, _info, next| async move {
///     next.call(ctx.with_value(Audited), req).await
/// });
/// # drop(audit);
/// ```
pub fn unary_server_fn<F, Fut>(f: F) -> InterceptorFn<F>
where
    F: Fn(Context, BoxMessage, MethodInfo, UnaryHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
{
    InterceptorFn { f }
}

/// Adapts a closure into a [`StreamServerInterceptor`].
pub fn stream_server_fn<F, Fut>(f: F) -> InterceptorFn<F>
where
    F: Fn(BoxServerStream, MethodInfo, StreamHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    InterceptorFn { f }
}

/// Adapts a closure into a [`UnaryClientInterceptor`].
pub fn unary_client_fn<F, Fut>(f: F) -> InterceptorFn<F>
where
    F: Fn(Context, BoxMessage, MethodInfo, UnaryInvoker) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
{
    InterceptorFn { f }
}

/// Adapts a closure into a [`StreamClientInterceptor`].
pub fn stream_client_fn<F, Fut>(f: F) -> InterceptorFn<F>
where
    F: Fn(Context, MethodInfo, Streamer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxClientStream, Status>> + Send + 'static,
{
    InterceptorFn { f }
}

#[tonic::async_trait]
impl<F, Fut> UnaryServerInterceptor for InterceptorFn<F>
where
    F: Fn(Context, BoxMessage, MethodInfo, UnaryHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
{
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        (self.f)(ctx, req, info.clone(), next).await
    }
}

#[tonic::async_trait]
impl<F, Fut> StreamServerInterceptor for InterceptorFn<F>
where
    F: Fn(BoxServerStream, MethodInfo, StreamHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        next: StreamHandler,
    ) -> Result<(), Status> {
        (self.f)(stream, info.clone(), next).await
    }
}

#[tonic::async_trait]
impl<F, Fut> UnaryClientInterceptor for InterceptorFn<F>
where
    F: Fn(Context, BoxMessage, MethodInfo, UnaryInvoker) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxMessage, Status>> + Send + 'static,
{
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryInvoker,
    ) -> Result<BoxMessage, Status> {
        (self.f)(ctx, req, info.clone(), next).await
    }
}

#[tonic::async_trait]
impl<F, Fut> StreamClientInterceptor for InterceptorFn<F>
where
    F: Fn(Context, MethodInfo, Streamer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxClientStream, Status>> + Send + 'static,
{
    async fn intercept(
        &self,
        ctx: Context,
        info: &MethodInfo,
        next: Streamer,
    ) -> Result<BoxClientStream, Status> {
        (self.f)(ctx, info.clone(), next).await
    }
}
