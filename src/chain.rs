//! Composition of interceptors into a single interceptor.
//!
//! A chain over `[i1, i2, .., iN]` runs `i1` first, with a `next` that runs
//! `i2`, and so on until the real handler. Context passed to `next` is visible
//! to every later link and the handler, never to links already running.

use crate::callmeta::MethodInfo;
use crate::context::Context;
use crate::interceptor::{
    StreamClientInterceptor, StreamHandler, StreamServerInterceptor, Streamer,
    UnaryClientInterceptor, UnaryHandler, UnaryInvoker, UnaryServerInterceptor,
};
use crate::message::BoxMessage;
use crate::stream::{BoxClientStream, BoxServerStream};
use std::fmt;
use std::sync::Arc;
use tonic::Status;

/// An ordered list of interceptors acting as one.
///
/// An empty chain calls straight through to the handler.
pub struct Chain<I: ?Sized> {
    links: Arc<[Arc<I>]>,
}

impl<I: ?Sized> Chain<I> {
    /// Chain running `links` in order.
    pub fn new(links: Vec<Arc<I>>) -> Self {
        Self {
            links: links.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<I: ?Sized> Clone for Chain<I> {
    fn clone(&self) -> Self {
        Self {
            links: Arc::clone(&self.links),
        }
    }
}

impl<I: ?Sized> fmt::Debug for Chain<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("links", &self.links.len()).finish()
    }
}

/// Chains unary server interceptors; the first one runs outermost.
pub fn chain_unary_server(
    interceptors: Vec<Arc<dyn UnaryServerInterceptor>>,
) -> Chain<dyn UnaryServerInterceptor> {
    Chain::new(interceptors)
}

/// Chains stream server interceptors; the first one runs outermost.
pub fn chain_stream_server(
    interceptors: Vec<Arc<dyn StreamServerInterceptor>>,
) -> Chain<dyn StreamServerInterceptor> {
    Chain::new(interceptors)
}

/// Chains unary client interceptors; the last one runs next to the transport.
pub fn chain_unary_client(
    interceptors: Vec<Arc<dyn UnaryClientInterceptor>>,
) -> Chain<dyn UnaryClientInterceptor> {
    Chain::new(interceptors)
}

/// Chains stream client interceptors; the last one opens the stream.
pub fn chain_stream_client(
    interceptors: Vec<Arc<dyn StreamClientInterceptor>>,
) -> Chain<dyn StreamClientInterceptor> {
    Chain::new(interceptors)
}

#[tonic::async_trait]
impl UnaryServerInterceptor for Chain<dyn UnaryServerInterceptor> {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        handler: UnaryHandler,
    ) -> Result<BoxMessage, Status> {
        let Some((first, rest)) = self.links.split_first() else {
            return handler.call(ctx, req).await;
        };

        let mut next = handler;
        for link in rest.iter().rev() {
            let link = Arc::clone(link);
            let info = info.clone();
            let inner = next;
            next = UnaryHandler::new(move |ctx, req| async move {
                link.intercept(ctx, req, &info, inner).await
            });
        }
        first.intercept(ctx, req, info, next).await
    }
}

#[tonic::async_trait]
impl StreamServerInterceptor for Chain<dyn StreamServerInterceptor> {
    async fn intercept(
        &self,
        stream: BoxServerStream,
        info: &MethodInfo,
        handler: StreamHandler,
    ) -> Result<(), Status> {
        let Some((first, rest)) = self.links.split_first() else {
            return handler.call(stream).await;
        };

        let mut next = handler;
        for link in rest.iter().rev() {
            let link = Arc::clone(link);
            let info = info.clone();
            let inner = next;
            next = StreamHandler::new(move |stream| async move {
                link.intercept(stream, &info, inner).await
            });
        }
        first.intercept(stream, info, next).await
    }
}

#[tonic::async_trait]
impl UnaryClientInterceptor for Chain<dyn UnaryClientInterceptor> {
    async fn intercept(
        &self,
        ctx: Context,
        req: BoxMessage,
        info: &MethodInfo,
        invoker: UnaryInvoker,
    ) -> Result<BoxMessage, Status> {
        let Some((first, rest)) = self.links.split_first() else {
            return invoker.call(ctx, req).await;
        };

        let mut next = invoker;
        for link in rest.iter().rev() {
            let link = Arc::clone(link);
            let info = info.clone();
            let inner = next;
            next = UnaryInvoker::new(move |ctx, req| async move {
                link.intercept(ctx, req, &info, inner).await
            });
        }
        first.intercept(ctx, req, info, next).await
    }
}

#[tonic::async_trait]
impl StreamClientInterceptor for Chain<dyn StreamClientInterceptor> {
    async fn intercept(
        &self,
        ctx: Context,
        info: &MethodInfo,
        streamer: Streamer,
    ) -> Result<BoxClientStream, Status> {
        let Some((first, rest)) = self.links.split_first() else {
            return streamer.call(ctx).await;
        };

        let mut next = streamer;
        for link in rest.iter().rev() {
            let link = Arc::clone(link);
            let info = info.clone();
            let inner = next;
            next = Streamer::new(move |ctx| async move { link.intercept(ctx, &info, inner).await });
        }
        first.intercept(ctx, info, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{stream_client_fn, stream_server_fn, unary_client_fn, unary_server_fn};
    use crate::stream::with_stream_context;
    use crate::testing::{text, MockClientStream, MockServerStream};
    use std::sync::Mutex;
    use tokio_test::assert_err;

    #[derive(Debug, Clone, Default)]
    struct Trail(String);

    fn trail(ctx: &Context) -> String {
        ctx.value::<Trail>().map(|t| t.0.clone()).unwrap_or_default()
    }

    fn marking(letter: char) -> Arc<dyn UnaryServerInterceptor> {
        Arc::new(unary_server_fn(move |ctx: Context, req, _info, next| {
            let marked = Trail(format!("{}{letter}", trail(&ctx)));
            async move { next.call(ctx.with_value(marked), req).await }
        }))
    }

    fn echo_trail() -> UnaryHandler {
        UnaryHandler::new(|ctx, _req| async move { Ok(text(&trail(&ctx))) })
    }

    fn unary() -> MethodInfo {
        MethodInfo::unary("/pkg.Svc/Call")
    }

    #[tokio::test]
    async fn runs_links_left_to_right() {
        let chain = chain_unary_server(vec![marking('A'), marking('B'), marking('C')]);

        let resp = chain
            .intercept(Context::new(), text("req"), &unary(), echo_trail())
            .await
            .unwrap();
        assert_eq!(resp.downcast_ref::<String>().unwrap(), "ABC");
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let chain = chain_unary_server(vec![]);
        assert!(chain.is_empty());

        let ctx = Context::new().with_value(Trail("X".into()));
        let resp = chain
            .intercept(ctx, text("req"), &unary(), echo_trail())
            .await
            .unwrap();
        assert_eq!(resp.downcast_ref::<String>().unwrap(), "X");
    }

    #[tokio::test]
    async fn context_does_not_flow_backwards() {
        let seen_after = Arc::new(Mutex::new(String::new()));
        let observer: Arc<dyn UnaryServerInterceptor> = {
            let seen_after = seen_after.clone();
            Arc::new(unary_server_fn(move |ctx: Context, req, _info, next| {
                let seen_after = seen_after.clone();
                async move {
                    let result = next.call(ctx.clone(), req).await;
                    *seen_after.lock().unwrap() = trail(&ctx);
                    result
                }
            }))
        };
        let chain = chain_unary_server(vec![marking('A'), observer, marking('B')]);

        let resp = chain
            .intercept(Context::new(), text("req"), &unary(), echo_trail())
            .await
            .unwrap();
        assert_eq!(resp.downcast_ref::<String>().unwrap(), "AB");
        assert_eq!(*seen_after.lock().unwrap(), "A");
    }

    #[tokio::test]
    async fn short_circuit_skips_rest_of_chain() {
        let reached = Arc::new(Mutex::new(false));
        let deny: Arc<dyn UnaryServerInterceptor> =
            Arc::new(unary_server_fn(|_ctx, _req, _info, _next| async move {
                Err::<BoxMessage, _>(Status::permission_denied("stop"))
            }));
        let flag = reached.clone();
        let handler = UnaryHandler::new(move |_ctx, req| async move {
            *flag.lock().unwrap() = true;
            Ok(req)
        });

        let chain = chain_unary_server(vec![marking('A'), deny, marking('B')]);
        let status = assert_err!(
            chain
                .intercept(Context::new(), text("req"), &unary(), handler)
                .await
        );

        assert_eq!(status.code(), tonic::Code::PermissionDenied);
        assert!(!*reached.lock().unwrap());
    }

    #[tokio::test]
    async fn cached_reply_skips_rest_of_chain() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let spy = |name: &'static str| -> Arc<dyn UnaryServerInterceptor> {
            let ran = ran.clone();
            Arc::new(unary_server_fn(move |ctx: Context, req, _info, next| {
                ran.lock().unwrap().push(name);
                async move { next.call(ctx, req).await }
            }))
        };
        let cache: Arc<dyn UnaryServerInterceptor> =
            Arc::new(unary_server_fn(|_ctx, _req, _info, _next| async move {
                Ok::<_, Status>(text("cached"))
            }));
        let handler = {
            let ran = ran.clone();
            UnaryHandler::new(move |_ctx, req| async move {
                ran.lock().unwrap().push("handler");
                Ok(req)
            })
        };

        let chain = chain_unary_server(vec![spy("before"), cache, spy("after")]);
        let resp = chain
            .intercept(Context::new(), text("req"), &unary(), handler)
            .await
            .unwrap();

        assert_eq!(resp.downcast_ref::<String>().unwrap(), "cached");
        assert_eq!(*ran.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn stream_link_can_finish_without_the_handler() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let stop: Arc<dyn StreamServerInterceptor> =
            Arc::new(stream_server_fn(|_stream, _info, _next| async move {
                Ok::<_, Status>(())
            }));
        let after: Arc<dyn StreamServerInterceptor> = {
            let ran = ran.clone();
            Arc::new(stream_server_fn(move |stream, _info, next: StreamHandler| {
                ran.lock().unwrap().push("after");
                async move { next.call(stream).await }
            }))
        };
        let handler = {
            let ran = ran.clone();
            StreamHandler::new(move |_stream| async move {
                ran.lock().unwrap().push("handler");
                Ok(())
            })
        };

        let chain = chain_stream_server(vec![stop, after]);
        let info = MethodInfo::streaming("/pkg.Svc/Watch", false, true);
        chain
            .intercept(Box::new(MockServerStream::default()), &info, handler)
            .await
            .unwrap();
        assert!(ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_chain_threads_context_through_wrapper() {
        let mark = |letter: char| -> Arc<dyn StreamServerInterceptor> {
            Arc::new(stream_server_fn(move |stream: BoxServerStream, _info, next| {
                let ctx = stream.context();
                let marked = Trail(format!("{}{letter}", trail(&ctx)));
                let stream = with_stream_context(stream, ctx.with_value(marked));
                async move { next.call(stream).await }
            }))
        };
        let seen = Arc::new(Mutex::new(String::new()));
        let out = seen.clone();
        let handler = StreamHandler::new(move |stream| async move {
            *out.lock().unwrap() = trail(&stream.context());
            Ok(())
        });

        let chain = chain_stream_server(vec![mark('A'), mark('B')]);
        let info = MethodInfo::streaming("/pkg.Svc/Watch", false, true);
        chain
            .intercept(Box::new(MockServerStream::default()), &info, handler)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), "AB");
    }

    #[tokio::test]
    async fn client_chains_reach_the_transport() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tag = |name: &'static str| -> Arc<dyn UnaryClientInterceptor> {
            let order = order.clone();
            Arc::new(unary_client_fn(move |ctx, req, _info, next| {
                order.lock().unwrap().push(name);
                async move { next.call(ctx, req).await }
            }))
        };
        let chain = chain_unary_client(vec![tag("first"), tag("second")]);
        let invoker = UnaryInvoker::new(|_ctx, _req| async move { Ok(text("reply")) });

        let reply = chain
            .intercept(Context::new(), text("req"), &unary(), invoker)
            .await
            .unwrap();
        assert_eq!(reply.downcast_ref::<String>().unwrap(), "reply");
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);

        let link: Arc<dyn StreamClientInterceptor> = Arc::new(stream_client_fn(
            |ctx: Context, _info, next: Streamer| async move {
                next.call(ctx.with_value(Trail("S".into()))).await
            },
        ));
        let stream_chain = chain_stream_client(vec![link]);
        let streamer = Streamer::new(|ctx| async move {
            Ok(Box::new(MockClientStream::with_inbound(ctx, vec![])) as BoxClientStream)
        });
        let info = MethodInfo::streaming("/pkg.Svc/Upload", true, false);
        let stream = stream_chain
            .intercept(Context::new(), &info, streamer)
            .await
            .unwrap();
        assert_eq!(trail(&stream.context()), "S");
    }
}
