//! Test doubles shared by the unit tests.

use crate::callmeta::CallMeta;
use crate::context::Context;
use crate::message::{BoxMessage, Message};
use crate::reporter::{ClientReportable, Reporter, ServerReportable};
use crate::stream::{ClientStream, ServerStream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonic::Status;

/// In-memory stream fed from a queue; records what was sent as `Debug` text.
#[derive(Default)]
pub struct MockServerStream {
    pub ctx: Context,
    pub inbound: VecDeque<Result<BoxMessage, Status>>,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub fail_send: Option<Status>,
}

impl MockServerStream {
    pub fn with_inbound(inbound: Vec<Result<BoxMessage, Status>>) -> Self {
        Self {
            inbound: inbound.into(),
            ..Default::default()
        }
    }
}

#[tonic::async_trait]
impl ServerStream for MockServerStream {
    fn context(&self) -> Context {
        self.ctx.clone()
    }

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status> {
        if let Some(status) = &self.fail_send {
            return Err(status.clone());
        }
        self.sent.lock().unwrap().push(format!("{msg:?}"));
        Ok(())
    }

    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status> {
        self.inbound.pop_front().transpose()
    }
}

#[derive(Default)]
pub struct MockClientStream {
    pub ctx: Context,
    pub inbound: VecDeque<Result<BoxMessage, Status>>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl MockClientStream {
    pub fn with_inbound(ctx: Context, inbound: Vec<Result<BoxMessage, Status>>) -> Self {
        Self {
            ctx,
            inbound: inbound.into(),
            ..Default::default()
        }
    }
}

#[tonic::async_trait]
impl ClientStream for MockClientStream {
    fn context(&self) -> Context {
        self.ctx.clone()
    }

    async fn send_msg(&mut self, msg: &dyn Message) -> Result<(), Status> {
        self.sent.lock().unwrap().push(format!("{msg:?}"));
        Ok(())
    }

    async fn recv_msg(&mut self) -> Result<Option<BoxMessage>, Status> {
        self.inbound.pop_front().transpose()
    }
}

/// One reporter callback, with the message rendered as `Debug` text.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(CallMeta),
    Send(Option<String>, Option<tonic::Code>),
    Receive(Option<String>, Option<tonic::Code>),
    Call(Option<tonic::Code>),
}

/// Reportable that records every event of every call it instruments.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn start(&self, ctx: Context, meta: &CallMeta) -> (Box<dyn Reporter>, Context) {
        self.events.lock().unwrap().push(Event::Start(meta.clone()));
        let reporter = RecordingReporter {
            events: self.events.clone(),
        };
        (Box::new(reporter), ctx.with_value(Reported))
    }
}

/// Marker the recorder injects into the call context.
#[derive(Debug, PartialEq)]
pub struct Reported;

impl ServerReportable for Recorder {
    fn server_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        _req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        self.start(ctx, meta)
    }
}

impl ClientReportable for Recorder {
    fn client_reporter(
        &self,
        ctx: Context,
        meta: &CallMeta,
        _req: Option<&dyn Message>,
    ) -> (Box<dyn Reporter>, Context) {
        self.start(ctx, meta)
    }
}

struct RecordingReporter {
    events: Arc<Mutex<Vec<Event>>>,
}

fn render(msg: Option<&dyn Message>) -> Option<String> {
    msg.map(|msg| format!("{msg:?}"))
}

impl Reporter for RecordingReporter {
    fn post_call(&mut self, err: Option<&Status>, _elapsed: Duration) {
        let code = err.map(Status::code);
        self.events.lock().unwrap().push(Event::Call(code));
    }

    fn post_msg_send(&mut self, msg: Option<&dyn Message>, err: Option<&Status>, _: Duration) {
        let event = Event::Send(render(msg), err.map(Status::code));
        self.events.lock().unwrap().push(event);
    }

    fn post_msg_receive(&mut self, msg: Option<&dyn Message>, err: Option<&Status>, _: Duration) {
        let event = Event::Receive(render(msg), err.map(Status::code));
        self.events.lock().unwrap().push(event);
    }
}

pub fn text(s: &str) -> BoxMessage {
    Box::new(s.to_string())
}

pub fn quoted(s: &str) -> Option<String> {
    Some(format!("{s:?}"))
}
