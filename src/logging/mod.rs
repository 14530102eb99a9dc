//! Call logging built on the reporter protocol.
//!
//! [`LoggingReportable`] turns reporter events into log lines and hands them to
//! a [`Logger`]. [`TracingLogger`] forwards them to `tracing`; any other backend
//! only has to implement the single [`Logger::log`] method.

mod options;
mod reporter;

pub use options::{
    default_client_code_to_level, default_server_code_to_level, LoggableEvent, LoggingConfig,
    LoggingOptions,
};
pub use reporter::LoggingReportable;

use crate::context::Context;
use std::fmt;
use tracing::Level;

/// Logging backend.
pub trait Logger: Send + Sync + 'static {
    fn log(&self, ctx: &Context, level: Level, msg: &str, fields: &Fields);
}

/// Logger emitting one `tracing` event per line.
///
/// The keys written by [`LoggingReportable`] become named event fields
/// (`grpc.service`, `grpc.code`, ...). Anything else, such as fields added
/// with [`inject_fields`], is rendered into a single `fields` value.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

macro_rules! emit {
    ($level:expr, $line:ident, $msg:expr) => {
        tracing::event!(
            $level,
            protocol = $line.protocol,
            grpc.component = $line.component,
            grpc.service = $line.service,
            grpc.method = $line.method,
            grpc.method_type = $line.method_type,
            grpc.code = $line.code,
            grpc.time_ms = $line.time_ms,
            grpc.msg_id = $line.msg_id,
            grpc.payload_size = $line.payload_size,
            grpc.request.content = $line.request_content,
            grpc.response.content = $line.response_content,
            grpc.error = $line.error,
            fields = $line.rest.as_deref(),
            "{}",
            $msg
        )
    };
}

impl Logger for TracingLogger {
    fn log(&self, _ctx: &Context, level: Level, msg: &str, fields: &Fields) {
        let line = LineFields::split(fields);
        match level {
            Level::ERROR => emit!(Level::ERROR, line, msg),
            Level::WARN => emit!(Level::WARN, line, msg),
            Level::INFO => emit!(Level::INFO, line, msg),
            Level::DEBUG => emit!(Level::DEBUG, line, msg),
            _ => emit!(Level::TRACE, line, msg),
        }
    }
}

/// A log line's fields sorted into the well-known keys and the rest.
#[derive(Default)]
struct LineFields<'a> {
    protocol: Option<&'a str>,
    component: Option<&'a str>,
    service: Option<&'a str>,
    method: Option<&'a str>,
    method_type: Option<&'a str>,
    code: Option<&'a str>,
    time_ms: Option<&'a str>,
    msg_id: Option<&'a str>,
    payload_size: Option<&'a str>,
    request_content: Option<&'a str>,
    response_content: Option<&'a str>,
    error: Option<&'a str>,
    rest: Option<String>,
}

impl<'a> LineFields<'a> {
    fn split(fields: &'a Fields) -> Self {
        let mut line = Self::default();
        let mut rest = Fields::new();
        for (key, value) in fields.iter() {
            let slot = match key {
                "protocol" => &mut line.protocol,
                "grpc.component" => &mut line.component,
                "grpc.service" => &mut line.service,
                "grpc.method" => &mut line.method,
                "grpc.method_type" => &mut line.method_type,
                "grpc.code" => &mut line.code,
                "grpc.time_ms" => &mut line.time_ms,
                "grpc.msg_id" => &mut line.msg_id,
                "grpc.payload_size" => &mut line.payload_size,
                "grpc.request.content" => &mut line.request_content,
                "grpc.response.content" => &mut line.response_content,
                "grpc.error" => &mut line.error,
                _ => {
                    rest.push(key, value);
                    continue;
                }
            };
            // First value wins, as with `Fields::get`.
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        if !rest.is_empty() {
            line.rest = Some(rest.to_string());
        }
        line
    }
}

/// Ordered key/value pairs attached to a log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    /// An empty set of fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key=value` and returns `self`.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Appends `key=value`. Duplicate keys are kept.
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Value of the first field named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extend<(String, String)> for Fields {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Fields {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ContextFields(Fields);

/// Returns `ctx` with `fields` appended to the fields it already carries.
///
/// Loggers receive these on every line logged for the call.
pub fn inject_fields(ctx: &Context, fields: Fields) -> Context {
    let mut merged = extract_fields(ctx);
    merged.extend(fields);
    ctx.with_value(ContextFields(merged))
}

/// Fields previously added with [`inject_fields`]; empty if there are none.
pub fn extract_fields(ctx: &Context) -> Fields {
    ctx.value::<ContextFields>()
        .map(|fields| fields.0.clone())
        .unwrap_or_default()
}
