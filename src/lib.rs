//! # grpc-interceptors
//!
//! Composable interceptors for gRPC servers and clients.
//!
//! This crate provides the building blocks for cross-cutting concerns (logging, authentication,
//! auditing, metrics) that run around every call: a call-scoped [`Context`], interceptor traits
//! for each call shape, chaining, per-route dispatch and a reporter protocol that turns any
//! instrumentation concern into interceptors for all four call shapes.
//!
//! ## Features
//!
//! - **Interceptor traits**: [`UnaryServerInterceptor`], [`StreamServerInterceptor`],
//!   [`UnaryClientInterceptor`] and [`StreamClientInterceptor`], or closures via
//!   [`unary_server_fn`] and friends
//! - **Chaining**: [`chain_unary_server()`] and friends compose interceptors left to right
//! - **Routing**: [`Mux`] picks a unary interceptor by exact route, with a default fallback
//! - **Stream context**: [`with_stream_context()`] replaces the context a stream handler sees
//! - **Reporting**: implement [`ServerReportable`] / [`ClientReportable`] once and get every
//!   call shape via [`server_interceptors()`] and [`client_interceptors()`]
//! - **Batteries**: [`logging`] (on top of `tracing`), [`AuthInterceptor`] and [`Selector`]
//!
//! Interceptors are transport-agnostic: messages are type-erased [`BoxMessage`]s (any
//! [`prost::Message`] qualifies) and errors are [`tonic::Status`].
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! grpc-interceptors = "0.0.2"
//! tokio = { version = "1", features = ["full"] }
//! tonic = "0.12"
//! ```
//!
//! Chain two interceptors in front of a handler:
//!
//! ```rust
//! use grpc_interceptors::{
//!     chain_unary_server, unary_server_fn, Context, MethodInfo, UnaryHandler,
//!     UnaryServerInterceptor,
//! };
//! use std::sync::Arc;
//! use tonic::Status;
//!
//! #[derive(Debug)]
//! struct RequestId(u64);
//!
//! # tokio_test::block_on(async {
//! let tag: Arc<dyn UnaryServerInterceptor> =
//!     Arc::new(unary_server_fn(|ctx: Context, req, _info, next| async move {
//!         next.call(ctx.with_value(RequestId(42)), req).await
//!     }));
//! let audit: Arc<dyn UnaryServerInterceptor> =
//!     Arc::new(unary_server_fn(|ctx: Context, req, info, next| async move {
//!         tracing::info!(route = %info.full_method(), "audited");
//!         next.call(ctx, req).await
//!     }));
//! let chain = chain_unary_server(vec![tag, audit]);
//!
//! let handler = UnaryHandler::typed(|ctx: Context, name: String| async move {
//!     let id = ctx.value::<RequestId>().map_or(0, |id| id.0);
//!     Ok::<_, Status>(format!("hello {name} ({id})"))
//! });
//!
//! let info = MethodInfo::unary("/greeter.Greeter/SayHello");
//! let reply = chain
//!     .intercept(Context::new(), Box::new("bob".to_string()), &info, handler)
//!     .await?;
//! assert_eq!(reply.downcast_ref::<String>().unwrap(), "hello bob (42)");
//! # Ok::<(), Status>(())
//! # })
//! # .unwrap();
//! ```
//!
//! ## Call Logging
//!
//! ```rust
//! use grpc_interceptors::logging::{LoggingOptions, LoggingReportable, TracingLogger};
//! use grpc_interceptors::{all_but_health, filtered, server_interceptors};
//!
//! let reportable = LoggingReportable::new(TracingLogger, LoggingOptions::server());
//! let (unary, stream) = server_interceptors(filtered(reportable, all_but_health));
//! # drop((unary, stream));
//! ```

pub mod logging;

mod auth;
mod callmeta;
mod chain;
mod client;
mod constants;
mod context;
mod error;
mod interceptor;
mod message;
mod mux;
mod reporter;
mod selector;
mod server;
mod stream;

#[cfg(test)]
mod testing;

// Re-export public API.
pub use auth::{auth_from_metadata, AuthFn, AuthInterceptor};
pub use callmeta::{split_full_method, CallKind, CallMeta, MethodInfo};
pub use chain::{
    chain_stream_client, chain_stream_server, chain_unary_client, chain_unary_server, Chain,
};
pub use client::{client_interceptors, ReportingStreamClient, ReportingUnaryClient};
pub use constants::{AUTHORIZATION_HEADER, DEFAULT_ROUTE, HEALTH_SERVICE};
pub use context::{Context, IncomingMetadata};
pub use error::{InterceptorError, Result};
pub use interceptor::{
    stream_client_fn, stream_server_fn, unary_client_fn, unary_server_fn, BoxFuture,
    InterceptorFn, StreamClientInterceptor, StreamHandler, StreamServerInterceptor, Streamer,
    UnaryClientInterceptor, UnaryHandler, UnaryInvoker, UnaryServerInterceptor,
};
pub use message::{BoxMessage, Message};
pub use mux::Mux;
pub use reporter::{
    filtered, ClientReportable, Decider, Filtered, NoopReporter, Reporter, ServerReportable,
};
pub use selector::{all_but_health, Selector};
pub use server::{server_interceptors, ReportingStreamServer, ReportingUnaryServer};
pub use stream::{
    with_stream_context, wrap_server_stream, BoxClientStream, BoxServerStream, ClientStream,
    ServerStream, WrappedServerStream,
};
