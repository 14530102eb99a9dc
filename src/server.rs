use crate::callmeta::{CallMeta, MethodInfo};
use crate::context::Context;
use crate::interceptor::{
    StreamHandler, StreamServerInterceptor, UnaryHandler, UnaryServerInterceptor,
};
use crate::message::{BoxMessage, Message};
use crate::reporter::{Reporter, ServerReportable, SharedReporter};
use crate::stream::{with_stream_context, BoxServerStream, ServerStream};
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::Status;

/// Unary server interceptor driving a [`ServerReportable`].
///
/// Reports the request as received, runs the handler, reports the response
/// (or the handler's error) as sent, then finishes the call.
#[derive(Debug, Clone)]
pub struct ReportingUnaryServer<R> {
    reportable: R,
}

impl<R: ServerReportable> ReportingUnaryServer<R> {
    /// Reports every unary call served through it to `reportable`.
    pub fn new(reportable: R) -> Self {
        Self { reportable }
    }
}

#[tonic::async_trait]
impl<R: ServerReportable> UnaryServerInterceptor for ReportingUnaryServer<R> {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        let started = Instant::now();
        let meta = CallMeta::server(info);
        let (mut reporter, ctx) = self.reportable.server_reporter(ctx, &meta, Some(&*req));

        reporter.post_msg_receive(Some(&*req), None, started.elapsed());
        let result = next.call(ctx, req).await;
        match &result {
            Ok(resp) => reporter.post_msg_send(Some(&**resp), None, started.elapsed()),
            Err(status) => reporter.post_msg_send(None, Some(status), started.elapsed()),
        }
        reporter.post_call(result.as_ref().err(), started.elapsed());
        result
    }
}

/// Streaming server interceptor driving a [`ServerReportable`].
///
/// The handler receives a stream that reports every message it sends and
/// receives; the call is finished when the handler returns.
#[derive(Debug, Clone)]
pub struct ReportingStreamServer<R> {
    reportable: R,
}

impl<R: ServerReportable> ReportingStreamServer<R> {
    /// Reports every streaming call served through it to `reportable`.
    pub fn new(reportable: R) -> Self {
        Self { reportable }
    }
}

#[tonic::async_trait]
impl<R: ServerReportable> StreamServerInterceptor for ReportingStreamServer<R> {
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        next: StreamHandler,
    ) -> Result<(), Status> {
        let started = Instant::now();
        let meta = CallMeta::server(info);
        let (reporter, ctx) = self
            .reportable
            .server_reporter(stream.context(), &meta, None);

        let mut reporter = SharedReporter::new(reporter);
        let monitored = MonitoredServerStream {
            inner: with_stream_context(stream, ctx),
            reporter: reporter.clone(),
        };

        let result = next.call(Box::new(monitored)).await;
        reporter.post_call(result.as_ref().err(), started.elapsed());
        result
    }
}

/// Builds both server adapters over one shared reportable.
pub fn server_interceptors<R: ServerReportable + Clone>(
    reportable: R,
) -> (ReportingUnaryServer<R>, ReportingStreamServer<R>) {
    (
        ReportingUnaryServer::new(reportable.clone()),
        ReportingStreamServer::new(reportable),
    )
}

struct MonitoredServerStream {
    inner: BoxServerStream,
    reporter: SharedReporter,
}

#[tonic::async_trait]
impl ServerStream for MonitoredServerStream {
    fn context(&self) -> Context {
        self.inner.context()
    }

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status> {
        let timer = Instant::now();
        let result = self.inner.send_msg(msg).await;
        self.reporter
            .post_msg_send(Some(msg), result.as_ref().err(), timer.elapsed());
        result
    }

    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status> {
        let timer = Instant::now();
        let result = self.inner.recv_msg().await;
        match &result {
            Ok(msg) => self
                .reporter
                .post_msg_receive(msg.as_deref(), None, timer.elapsed()),
            Err(status) => self
                .reporter
                .post_msg_receive(None, Some(status), timer.elapsed()),
        }
        result
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
        self.inner.context_mut()
    }
}
