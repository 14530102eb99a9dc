use crate::callmeta::{CallKind, CallMeta, MethodInfo};
use crate::context::Context;
use crate::interceptor::{StreamClientInterceptor, Streamer, UnaryClientInterceptor, UnaryInvoker};
use crate::message::{BoxMessage, Message};
use crate::reporter::{ClientReportable, Reporter};
use crate::stream::{BoxClientStream, ClientStream};
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::Status;

/// Unary client interceptor driving a [`ClientReportable`].
#[derive(Debug, Clone)]
pub struct ReportingUnaryClient<R> {
    reportable: R,
}

impl<R: ClientReportable> ReportingUnaryClient<R> {
    /// Reports every unary call made through it to `reportable`.
    pub fn new(reportable: R) -> Self {
        Self { reportable }
    }
}

#[tonic::async_trait]
impl<R: ClientReportable> UnaryClientInterceptor for ReportingUnaryClient<R> {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        next: UnaryInvoker,
    ) -> Result<BoxMessage, Status> {
        let started = Instant::now();
        let meta = CallMeta::client(info);
        let (mut reporter, ctx) = self.reportable.client_reporter(ctx, &meta, Some(&*req));

        reporter.post_msg_send(Some(&*req), None, started.elapsed());
        let result = next.call(ctx, req).await;
        match &result {
            Ok(reply) => reporter.post_msg_receive(Some(&**reply), None, started.elapsed()),
            Err(status) => reporter.post_msg_receive(None, Some(status), started.elapsed()),
        }
        reporter.post_call(result.as_ref().err(), started.elapsed());
        result
    }
}

/// Streaming client interceptor driving a [`ClientReportable`].
///
/// The returned stream reports every send and receive. The call finishes on
/// the first receive that ends the stream: end-of-stream, an error, or the
/// single response of a client-streaming call. A stream dropped before that
/// point finishes the call as `Cancelled`.
#[derive(Debug, Clone)]
pub struct ReportingStreamClient<R> {
    reportable: R,
}

impl<R: ClientReportable> ReportingStreamClient<R> {
    /// Reports every streaming call made through it to `reportable`.
    pub fn new(reportable: R) -> Self {
        Self { reportable }
    }
}

#[tonic::async_trait]
impl<R: ClientReportable> StreamClientInterceptor for ReportingStreamClient<R> {
    async fn intercept(
        &self,
        ctx: Context,
        info: &MethodInfo,
        next: Streamer,
    ) -> Result<BoxClientStream, Status> {
        let started = Instant::now();
        let meta = CallMeta::client(info);
        let (mut reporter, ctx) = self.reportable.client_reporter(ctx, &meta, None);

        match next.call(ctx).await {
            Ok(inner) => {
                let monitored: BoxClientStream = Box::new(MonitoredClientStream {
                    inner,
                    reporter,
                    kind: meta.kind,
                    started,
                    finished: false,
                });
                Ok(monitored)
            }
            Err(status) => {
                reporter.post_call(Some(&status), started.elapsed());
                Err(status)
            }
        }
    }
}

/// Builds both client adapters over one shared reportable.
pub fn client_interceptors<R: ClientReportable + Clone>(
    reportable: R,
) -> (ReportingUnaryClient<R>, ReportingStreamClient<R>) {
    (
        ReportingUnaryClient::new(reportable.clone()),
        ReportingStreamClient::new(reportable),
    )
}

struct MonitoredClientStream {
    inner: BoxClientStream,
    reporter: Box<dyn Reporter>,
    kind: CallKind,
    started: Instant,
    finished: bool,
}

impl MonitoredClientStream {
    fn finish(&mut self, err: Option<&Status>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.reporter.post_call(err, self.started.elapsed());
    }
}

#[tonic::async_trait]
impl ClientStream for MonitoredClientStream {
    fn context(&self) -> Context {
        self.inner.context()
    }

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status> {
        if self.finished {
            return self.inner.send_msg(msg).await;
        }
        let timer = Instant::now();
        let result = self.inner.send_msg(msg).await;
        self.reporter
            .post_msg_send(Some(msg), result.as_ref().err(), timer.elapsed());
        result
    }

    // Once the call has finished, messages pass through unreported.
    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status> {
        if self.finished {
            return self.inner.recv_msg().await;
        }
        let timer = Instant::now();
        let result = self.inner.recv_msg().await;
        let elapsed = timer.elapsed();
        match &result {
            Ok(Some(msg)) => {
                self.reporter.post_msg_receive(Some(&**msg), None, elapsed);
                if !self.kind.server_streams() {
                    self.finish(None);
                }
            }
            Ok(None) => {
                self.reporter.post_msg_receive(None, None, elapsed);
                self.finish(None);
            }
            Err(status) => {
                self.reporter.post_msg_receive(None, Some(status), elapsed);
                self.finish(Some(status));
            }
        }
        result
    }

    async fn close_send(&mut self) -> Result<(), Status> {
        self.inner.close_send().await
    }

    async fn header(&mut self) -> Result<MetadataMap, Status> {
        self.inner.header().await
    }

    fn trailer(&self) -> MetadataMap {
        self.inner.trailer()
    }
}

impl Drop for MonitoredClientStream {
    fn drop(&mut self) {
        if !self.finished {
            let status = Status::cancelled("stream dropped before completion");
            self.finish(Some(&status));
        }
    }
}
