use super::options::{LoggableEvent, LoggingOptions};
use super::{extract_fields, inject_fields, Fields, Logger};
use crate::callmeta::CallMeta;
use crate::context::Context;
use crate::message::Message;
use crate::reporter::{ClientReportable, NoopReporter, Reporter, ServerReportable};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tonic::{Code, Status};
use tracing::Level;

/// Reportable that logs the lifecycle of every call through a [`Logger`].
///
/// Each line carries the call fields (`protocol`, `grpc.component`,
/// `grpc.service`, `grpc.method`, `grpc.method_type`) followed by any fields
/// injected into the context before the call started. The call fields are
/// also injected into the context handed on to the handler.
#[derive(Clone)]
pub struct LoggingReportable {
    logger: Arc<dyn Logger>,
    options: Arc<LoggingOptions>,
}

impl LoggingReportable {
    pub fn new(logger: impl Logger, options: LoggingOptions) -> Self {
        Self {
            logger: Arc::new(logger),
            options: Arc::new(options),
        }
    }

    fn reporter(&self, ctx: Context, meta: &CallMeta) -> (Box<dyn Reporter>, Context) {
        if self.options.skips(&meta.full_method()) {
            return (Box::new(NoopReporter), ctx);
        }

        let call_fields = Fields::new()
            .with("protocol", "grpc")
            .with("grpc.component", meta.role())
            .with("grpc.service", &meta.service)
            .with("grpc.method", &meta.method)
            .with("grpc.method_type", meta.kind);
        let mut fields = call_fields.clone();
        fields.extend(extract_fields(&ctx));
        let ctx = inject_fields(&ctx, call_fields);

        if self.options.logs(LoggableEvent::StartCall) {
            self.logger.log(&ctx, Level::INFO, "started call", &fields);
        }

        let reporter = LoggingReporter {
            logger: Arc::clone(&self.logger),
            options: Arc::clone(&self.options),
            ctx: ctx.clone(),
            fields,
            is_client: meta.is_client,
            sent: 0,
            received: 0,
        };
        (Box::new(reporter), ctx)
    }
}

impl fmt::Debug for LoggingReportable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingReportable")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ServerReportable for LoggingReportable {
    fn server_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        _req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        self.reporter(ctx, meta)
    }
}

impl ClientReportable for LoggingReportable {
    fn client_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        _req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        self.reporter(ctx, meta)
    }
}

struct LoggingReporter {
    logger: Arc<dyn Logger>,
    options: Arc<LoggingOptions>,
    ctx: Context,
    fields: Fields,
    is_client: bool,
    sent: u64,
    received: u64,
}

fn code_of(err: Option<&Status>) -> Code {
    err.map_or(Code::Ok, Status::code)
}

fn millis(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64() * 1000.0)
}

impl LoggingReporter {
    fn payload(
        &self,
        msg: &str,
        content_key: &str,
        id: u64,
        payload: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        let mut fields = self.fields.clone().with("grpc.msg_id", id);
        if let Some(payload) = payload {
            fields.push(content_key, format!("{payload:?}"));
            fields.push("grpc.payload_size", payload.wire_len());
        }
        fields.push("grpc.time_ms", millis(elapsed));
        if let Some(status) = err {
            fields.push("grpc.error", status.message());
        }
        let level = self.options.level(code_of(err));
        self.logger.log(&self.ctx, level, msg, &fields);
    }
}

impl Reporter for LoggingReporter {
    fn post_call(&mut self, err: Option<&Status>, elapsed: Duration) {
        if !self.options.logs(LoggableEvent::FinishCall) {
            return;
        }
        let code = code_of(err);
        let mut fields = self
            .fields
            .clone()
            .with("grpc.code", format!("{code:?}"))
            .with("grpc.time_ms", millis(elapsed));
        if let Some(status) = err {
            fields.push("grpc.error", status.message());
        }
        let level = self.options.level(code);
        self.logger.log(&self.ctx, level, "finished call", &fields);
    }

    fn post_msg_send(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        self.sent += 1;
        if !self.options.logs(LoggableEvent::PayloadSent) {
            return;
        }
        let (line, key) = if self.is_client {
            ("request sent", "grpc.request.content")
        } else {
            ("response sent", "grpc.response.content")
        };
        self.payload(line, key, self.sent, msg, err, elapsed);
    }

    fn post_msg_receive(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        // Clean end of stream carries no payload.
        if msg.is_none() && err.is_none() {
            return;
        }
        self.received += 1;
        if !self.options.logs(LoggableEvent::PayloadReceived) {
            return;
        }
        let (line, key) = if self.is_client {
            ("response received", "grpc.response.content")
        } else {
            ("request received", "grpc.request.content")
        };
        self.payload(line, key, self.received, msg, err, elapsed);
    }
}
