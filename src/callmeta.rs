use crate::constants::UNKNOWN;
use std::fmt;
use std::sync::Arc;

/// Shape of a call, derived from whether each side streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// One request, one response.
    Unary,
    /// Many requests, one response.
    ClientStream,
    /// One request, many responses.
    ServerStream,
    /// Both sides stream.
    BidiStream,
}

impl CallKind {
    /// Kind of a call given which sides stream.
    pub fn from_streaming(client_streams: bool, server_streams: bool) -> Self {
        match (client_streams, server_streams) {
            (false, false) => CallKind::Unary,
            (true, false) => CallKind::ClientStream,
            (false, true) => CallKind::ServerStream,
            (true, true) => CallKind::BidiStream,
        }
    }

    /// Name used in log fields (`unary`, `client_stream`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Unary => "unary",
            CallKind::ClientStream => "client_stream",
            CallKind::ServerStream => "server_stream",
            CallKind::BidiStream => "bidi_stream",
        }
    }

    /// Whether the serving side sends more than one message.
    pub fn server_streams(&self) -> bool {
        matches!(self, CallKind::ServerStream | CallKind::BidiStream)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static descriptor of an RPC method, handed to every interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    full_method: Arc<str>,
    client_streams: bool,
    server_streams: bool,
}

impl MethodInfo {
    /// Descriptor for a request/response method such as `/pkg.Greeter/SayHello`.
    pub fn unary(full_method: impl Into<Arc<str>>) -> Self {
        Self::streaming(full_method, false, false)
    }

    /// Descriptor of a method where either side may stream.
    pub fn streaming(
        full_method: impl Into<Arc<str>>,
        client_streams: bool,
        server_streams: bool,
    ) -> Self {
        Self {
            full_method: full_method.into(),
            client_streams,
            server_streams,
        }
    }

    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    pub fn is_client_stream(&self) -> bool {
        self.client_streams
    }

    pub fn is_server_stream(&self) -> bool {
        self.server_streams
    }

    pub fn kind(&self) -> CallKind {
        CallKind::from_streaming(self.client_streams, self.server_streams)
    }
}

/// Immutable description of a single call, computed once when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMeta {
    pub kind: CallKind,
    pub service: String,
    pub method: String,
    pub is_client: bool,
}

impl CallMeta {
    pub fn server(info: &MethodInfo) -> Self {
        Self::new(info, false)
    }

    pub fn client(info: &MethodInfo) -> Self {
        Self::new(info, true)
    }

    fn new(info: &MethodInfo, is_client: bool) -> Self {
        let (service, method) = split_full_method(info.full_method());
        Self {
            kind: info.kind(),
            service: service.to_string(),
            method: method.to_string(),
            is_client,
        }
    }

    /// Reassembles the route, `/{service}/{method}`.
    pub fn full_method(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }

    pub fn role(&self) -> &'static str {
        if self.is_client {
            "client"
        } else {
            "server"
        }
    }
}

/// Splits a route of the form `/{service}/{method}` into its two halves.
///
/// The leading separator is stripped and the remainder is split on the last
/// `/`. Routes without a separator come from a misbehaving transport and map to
/// `("unknown", "unknown")`.
pub fn split_full_method(full_method: &str) -> (&str, &str) {
    let route = full_method.strip_prefix('/').unwrap_or(full_method);
    route.rsplit_once('/').unwrap_or((UNKNOWN, UNKNOWN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_routes() {
        assert_eq!(
            split_full_method("/grpc.health.v1.Health/Check"),
            ("grpc.health.v1.Health", "Check")
        );
        assert_eq!(split_full_method("/a/b/Method"), ("a/b", "Method"));
        assert_eq!(split_full_method("nope"), ("unknown", "unknown"));
    }

    #[test]
    fn classifies_kinds() {
        assert_eq!(MethodInfo::unary("/s/m").kind(), CallKind::Unary);
        assert_eq!(
            MethodInfo::streaming("/s/m", true, false).kind(),
            CallKind::ClientStream
        );
        assert_eq!(
            MethodInfo::streaming("/s/m", false, true).kind(),
            CallKind::ServerStream
        );
        assert_eq!(
            MethodInfo::streaming("/s/m", true, true).kind(),
            CallKind::BidiStream
        );
        assert_eq!(CallKind::BidiStream.to_string(), "bidi_stream");
    }

    #[test]
    fn builds_call_meta() {
        let info = MethodInfo::streaming("/pkg.Echo/Chat", true, true);
        let meta = CallMeta::client(&info);

        assert_eq!(meta.service, "pkg.Echo");
        assert_eq!(meta.method, "Chat");
        assert_eq!(meta.kind, CallKind::BidiStream);
        assert_eq!(meta.role(), "client");
        assert_eq!(meta.full_method(), "/pkg.Echo/Chat");
        assert_eq!(CallMeta::server(&info).role(), "server");
    }
}
