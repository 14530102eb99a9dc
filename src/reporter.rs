//! Reporter protocol: per-call lifecycle events for instrumentation concerns.
//!
//! A concern implements [`ServerReportable`] and/or [`ClientReportable`]; the
//! adapters in [`crate::server`] and [`crate::client`] then drive the returned
//! [`Reporter`] for every call shape.

use crate::callmeta::CallMeta;
use crate::context::Context;
use crate::message::Message;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tonic::Status;

/// Per-call event sink.
///
/// The adapters invoke these callbacks sequentially for a given call, with
/// `post_call` always last and exactly once. A `None` error means success. On
/// receive, `None` for both the message and the error is the clean end of the
/// stream.
///
/// Every method defaults to doing nothing, so implementations only override
/// the events they care about.
pub trait Reporter: Send {
    fn post_call(&mut self, _err: Option<&Status>, _elapsed: Duration) {}

    fn post_msg_send(
        &mut self,
        _msg: Option<&dyn Message>,
        _err: Option<&Status>,
        _elapsed: Duration,
    ) {
    }

    fn post_msg_receive(
        &mut self,
        _msg: Option<&dyn Message>,
        _err: Option<&Status>,
        _elapsed: Duration,
    ) {
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn post_call(&mut self, err: Option<&Status>, elapsed: Duration) {
        (**self).post_call(err, elapsed)
    }

    fn post_msg_send(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        (**self).post_msg_send(msg, err, elapsed)
    }

    fn post_msg_receive(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        (**self).post_msg_receive(msg, err, elapsed)
    }
}

/// Reporter returned for calls that should not be instrumented.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Creates reporters for calls served by this process.
pub trait ServerReportable: Send + Sync + 'static {
    /// Called when a call starts. `req` is the request for unary calls and
    /// `None` for streams. The returned context replaces the call's context.
    fn server_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context);
}

/// Creates reporters for calls made by this process.
pub trait ClientReportable: Send + Sync + 'static {
    fn client_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context);
}

impl<R: ServerReportable + ?Sized> ServerReportable for Arc<R> {
    fn server_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        (**self).server_reporter(ctx, meta, req)
    }
}

impl<R: ClientReportable + ?Sized> ClientReportable for Arc<R> {
    fn client_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        (**self).client_reporter(ctx, meta, req)
    }
}

/// Decides whether a call should be intercepted or instrumented.
///
/// Returning `false` selects the no-op path. Implemented for any
/// `Fn(&Context, &CallMeta) -> bool`.
pub trait Decider: Send + Sync + 'static {
    fn decide(&self, ctx: &Context, meta: &CallMeta) -> bool;
}

impl<F> Decider for F
where
    F: Fn(&Context, &CallMeta) -> bool + Send + Sync + 'static,
{
    fn decide(&self, ctx: &Context, meta: &CallMeta) -> bool {
        self(ctx, meta)
    }
}

/// Reportable that hands out [`NoopReporter`] whenever its decider says no.
#[derive(Debug, Clone)]
pub struct Filtered<R, D> {
    reportable: R,
    decider: D,
}

/// Restricts `reportable` to the calls `decider` accepts.
pub fn filtered<R, D>(reportable: R, decider: D) -> Filtered<R, D> {
    Filtered {
        reportable,
        decider,
    }
}

impl<R: ServerReportable, D: Decider> ServerReportable for Filtered<R, D> {
    fn server_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        if !self.decider.decide(&ctx, meta) {
            return (Box::new(NoopReporter), ctx);
        }
        self.reportable.server_reporter(ctx, meta, req)
    }
}

impl<R: ClientReportable, D: Decider> ClientReportable for Filtered<R, D> {
    fn client_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        if !self.decider.decide(&ctx, meta) {
            return (Box::new(NoopReporter), ctx);
        }
        self.reportable.client_reporter(ctx, meta, req)
    }
}

/// Reporter shared between an adapter and the stream it hands to the handler.
///
/// Calls are still strictly sequential; the lock only bridges ownership.
#[derive(Clone)]
pub(crate) struct SharedReporter(Arc<Mutex<Box<dyn Reporter>>>);

impl SharedReporter {
    pub(crate) fn new(reporter: Box<dyn Reporter>) -> Self {
        Self(Arc::new(Mutex::new(reporter)))
    }

    fn with<T>(&self, f: impl FnOnce(&mut dyn Reporter) -> T) -> T {
        let mut reporter = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **reporter)
    }
}

impl Reporter for SharedReporter {
    fn post_call(&mut self, err: Option<&Status>, elapsed: Duration) {
        self.with(|r| r.post_call(err, elapsed))
    }

    fn post_msg_send(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        self.with(|r| r.post_msg_send(msg, err, elapsed))
    }

    fn post_msg_receive(
        &mut self,
        msg: Option<&dyn Message>,
        err: Option<&Status>,
        elapsed: Duration,
    ) {
        self.with(|r| r.post_msg_receive(msg, err, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callmeta::MethodInfo;
    use crate::testing::{Event, Recorder};

    #[test]
    fn filtered_hands_out_noop_when_rejected() {
        let recorder = Recorder::default();
        let reportable = filtered(recorder.clone(), |_: &Context, meta: &CallMeta| {
            meta.method != "Check"
        });

        let skipped = CallMeta::server(&MethodInfo::unary("/grpc.health.v1.Health/Check"));
        let (mut reporter, _) = reportable.server_reporter(Context::new(), &skipped, None);
        reporter.post_call(None, Duration::ZERO);
        assert!(recorder.events().is_empty());

        let kept = CallMeta::client(&MethodInfo::unary("/pkg.Echo/Say"));
        let (mut reporter, _) = reportable.client_reporter(Context::new(), &kept, None);
        reporter.post_call(None, Duration::ZERO);
        assert_eq!(recorder.events(), vec![Event::Start(kept), Event::Call(None)]);
    }

    #[test]
    fn shared_reporter_forwards_to_inner() {
        let recorder = Recorder::default();
        let meta = CallMeta::server(&MethodInfo::unary("/s/m"));
        let (reporter, _) = recorder.server_reporter(Context::new(), &meta, None);

        let mut shared = SharedReporter::new(reporter);
        let mut clone = shared.clone();
        shared.post_msg_send(None, None, Duration::ZERO);
        clone.post_call(Some(&Status::aborted("x")), Duration::ZERO);

        assert_eq!(
            recorder.events()[1..],
            [
                Event::Send(None, None),
                Event::Call(Some(tonic::Code::Aborted))
            ]
        );
    }
}
