/// Mux key for the interceptor used when no route matches exactly.
pub const DEFAULT_ROUTE: &str = "default";

/// Metadata key carrying credentials, read by [`crate::auth::auth_from_metadata`].
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Fully qualified name of the standard gRPC health service.
pub const HEALTH_SERVICE: &str = "grpc.health.v1.Health";

/// Placeholder for service and method names of malformed routes.
pub(crate) const UNKNOWN: &str = "unknown";
