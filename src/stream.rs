use crate::context::Context;
use crate::message::{BoxMessage, Message};
use tonic::metadata::MetadataMap;
use tonic::Status;

/// Server side of a streaming call as seen by interceptors and handlers.
///
/// `recv_msg` returns `Ok(None)` once the peer has cleanly finished sending;
/// this is the end-of-stream signal, not an error.
#[tonic::async_trait]
pub trait ServerStream: Send + 'static {
    /// Context visible to the handler for this call.
    fn context(&self) -> Context;

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status>;

    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status>;

    fn set_header(&mut self, _metadata: MetadataMap) -> Result<(), Status> {
        Ok(())
    }

    async fn send_header(&mut self, _metadata: MetadataMap) -> Result<(), Status> {
        Ok(())
    }

    fn set_trailer(&mut self, _metadata: MetadataMap) {}

    /// Settable-context capability.
    ///
    /// Plain transport streams return `None`. Streams that let interceptors
    /// replace the context they expose return the slot holding it.
    fn context_mut(&mut self) -> Option<&mut Context> {
        None
    }
}

pub type BoxServerStream = Box<dyn ServerStream>;

/// Client side of a streaming call.
#[tonic::async_trait]
pub trait ClientStream: Send + 'static {
    fn context(&self) -> Context;

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status>;

    /// Receives the next message; `Ok(None)` marks the clean end of the stream.
    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status>;

    async fn close_send(&mut self) -> Result<(), Status> {
        Ok(())
    }

    async fn header(&mut self) -> Result<MetadataMap, Status> {
        Ok(MetadataMap::new())
    }

    fn trailer(&self) -> MetadataMap {
        MetadataMap::new()
    }
}

pub type BoxClientStream = Box<dyn ClientStream>;

/// Server stream whose context can be overridden by interceptors.
///
/// Every stream operation other than [`ServerStream::context`] is forwarded to
/// the wrapped stream untouched.
pub struct WrappedServerStream {
    inner: BoxServerStream,
    ctx: Context,
}

impl WrappedServerStream {
    pub fn new(inner: BoxServerStream) -> Self {
        let ctx = inner.context();
        Self { inner, ctx }
    }

    pub fn set_context(&mut self, ctx: Context) {
        self.ctx = ctx;
    }

    pub fn into_inner(self) -> BoxServerStream {
        self.inner
    }
}

#[tonic::async_trait]
impl ServerStream for WrappedServerStream {
    fn context(&self) -> Context {
        self.ctx.clone()
    }

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status> {
        self.inner.send_msg(msg).await
    }

    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status> {
        self.inner.recv_msg().await
    }

    fn set_header(&mut self, metadata: MetadataMap) -> Result<(), Status> {
        self.inner.set_header(metadata)
    }

    async fn send_header(&mut self, metadata: MetadataMap) -> Result<(), Status> {
        self.inner.send_header(metadata).await
    }

    fn set_trailer(&mut self, metadata: MetadataMap) {
        self.inner.set_trailer(metadata)
    }

    fn context_mut(&mut self) -> Option<&mut Context> {
        Some(&mut self.ctx)
    }
}

/// Wraps `stream` so its context can be replaced.
///
/// Streams that already have the settable-context capability are returned
/// as-is, so any number of interceptors can call this on the same stream
/// without nesting wrappers.
pub fn wrap_server_stream(mut stream: BoxServerStream) -> BoxServerStream {
    if stream.context_mut().is_some() {
        return stream;
    }
    Box::new(WrappedServerStream::new(stream))
}

/// Replaces the context downstream interceptors and the handler will observe.
pub fn with_stream_context(stream: BoxServerStream, ctx: Context) -> BoxServerStream {
    let mut stream = wrap_server_stream(stream);
    if let Some(slot) = stream.context_mut() {
        *slot = ctx;
    }
    stream
}
