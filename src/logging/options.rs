use crate::error::{InterceptorError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tonic::Code;
use tracing::Level;

/// A kind of log line the logging reporter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggableEvent {
    StartCall,
    FinishCall,
    PayloadReceived,
    PayloadSent,
}

/// Serializable part of the logging options.
///
/// ```json
/// { "events": ["start_call", "finish_call"], "skip_methods": ["/grpc.health.v1.Health/Check"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Events to log. Defaults to `finish_call` only.
    pub events: Vec<LoggableEvent>,

    /// Full routes (`/pkg.Service/Method`) that are never logged.
    pub skip_methods: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            events: vec![LoggableEvent::FinishCall],
            skip_methods: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for route in &self.skip_methods {
            let well_formed = route
                .strip_prefix('/')
                .and_then(|rest| rest.split_once('/'))
                .is_some_and(|(service, method)| !service.is_empty() && !method.is_empty());
            if !well_formed {
                return Err(InterceptorError::Configuration(format!(
                    "skip_methods entry {route:?} is not a /service/method route"
                )));
            }
        }
        Ok(())
    }
}

/// Options of a [`super::LoggingReportable`].
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    events: Vec<LoggableEvent>,
    skip_methods: Arc<[String]>,
    code_to_level: fn(Code) -> Level,
}

impl LoggingOptions {
    /// Default options for server-side logging.
    pub fn server() -> Self {
        Self::from_config(LoggingConfig::default(), default_server_code_to_level)
    }

    /// Default options for client-side logging.
    pub fn client() -> Self {
        Self::from_config(LoggingConfig::default(), default_client_code_to_level)
    }

    /// Options from a parsed [`LoggingConfig`] and a code-to-level mapping.
    pub fn from_config(config: LoggingConfig, code_to_level: fn(Code) -> Level) -> Self {
        Self {
            events: config.events,
            skip_methods: config.skip_methods.into(),
            code_to_level,
        }
    }

    /// Replaces the set of events that are logged.
    pub fn with_events(mut self, events: impl IntoIterator<Item = LoggableEvent>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn with_code_to_level(mut self, code_to_level: fn(Code) -> Level) -> Self {
        self.code_to_level = code_to_level;
        self
    }

    pub(crate) fn logs(&self, event: LoggableEvent) -> bool {
        self.events.contains(&event)
    }

    pub(crate) fn skips(&self, full_method: &str) -> bool {
        self.skip_methods.iter().any(|m| m == full_method)
    }

    pub(crate) fn level(&self, code: Code) -> Level {
        (self.code_to_level)(code)
    }
}

/// Log level for a call served by this process that ended with `code`.
pub fn default_server_code_to_level(code: Code) -> Level {
    match code {
        Code::Ok
        | Code::NotFound
        | Code::Cancelled
        | Code::AlreadyExists
        | Code::InvalidArgument
        | Code::Unauthenticated => Level::INFO,

        Code::DeadlineExceeded
        | Code::PermissionDenied
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange
        | Code::Unavailable => Level::WARN,

        Code::Unknown | Code::Unimplemented | Code::Internal | Code::DataLoss => Level::ERROR,
    }
}

/// Log level for a call made by this process that ended with `code`.
pub fn default_client_code_to_level(code: Code) -> Level {
    match code {
        Code::Ok
        | Code::Cancelled
        | Code::InvalidArgument
        | Code::NotFound
        | Code::AlreadyExists
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange => Level::DEBUG,

        Code::Unknown
        | Code::DeadlineExceeded
        | Code::PermissionDenied
        | Code::Unauthenticated => Level::INFO,

        Code::Unimplemented | Code::Internal | Code::Unavailable | Code::DataLoss => Level::WARN,
    }
}
