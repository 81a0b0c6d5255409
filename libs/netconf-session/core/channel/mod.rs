//! Per-connection execution context
//!
//! Every connection is driven by one task that owns the stream and the
//! pipeline. Reads, handler callbacks, writes, scheduled tasks and stage
//! replacements all run on that task, one at a time, so no two stages of
//! the same connection ever execute concurrently. [`Channel`] is the cheap,
//! cloneable handle other tasks use to reach it.

mod driver;
pub mod pipeline;
mod writer;

pub use pipeline::{names, Pipeline, Stage, StageKind};

use crate::message::NetconfMessage;
use crate::traits::{ChannelHandler, NetconfError, Result, SecurityHandshake, TransportStream};
use bytes::{Bytes, BytesMut};
use driver::ChannelDriver;
use parking_lot::Mutex;
use pipeline::SelfAction;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::codec::Encoder;
use tracing::trace;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// A task run on the channel's context
pub(crate) type Task = Box<dyn FnOnce(&mut HandlerContext<'_>) + Send + 'static>;

pub(crate) enum Command {
    Write {
        message: NetconfMessage,
        then: Option<Task>,
        done: oneshot::Sender<Result<()>>,
    },
    Execute(Task),
    Close,
}

struct ChannelInner {
    id: u64,
    peer: String,
    commands: mpsc::UnboundedSender<Command>,
    open: AtomicBool,
    closed: watch::Sender<bool>,
    security: Mutex<Option<SecurityHandshake>>,
}

/// Handle to a running connection
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Start driving `stream` with `pipeline`
    ///
    /// The pipeline's handlers receive [`crate::traits::ChannelEvent::Active`]
    /// before anything is read from the stream.
    pub fn spawn(stream: TransportStream, pipeline: Pipeline) -> Channel {
        let (io, peer, security) = stream.into_parts();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let channel = Channel {
            inner: Arc::new(ChannelInner {
                id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
                peer,
                commands,
                open: AtomicBool::new(true),
                closed,
                security: Mutex::new(security),
            }),
        };

        let driver = ChannelDriver::new(channel.clone(), receiver, io, pipeline);
        tokio::spawn(driver.run());
        channel
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Take the pending security handshake, if the transport attached one
    pub fn take_security_handshake(&self) -> Option<SecurityHandshake> {
        self.inner.security.lock().take()
    }

    /// Encode and write a message with the currently installed encoder
    pub fn write(&self, message: NetconfMessage) -> WriteFuture {
        self.submit_write(message, None)
    }

    /// Write a message, then run `then` on the channel's context right after
    /// the write has been encoded and queued
    pub(crate) fn write_then(&self, message: NetconfMessage, then: Task) -> WriteFuture {
        self.submit_write(message, Some(then))
    }

    fn submit_write(&self, message: NetconfMessage, then: Option<Task>) -> WriteFuture {
        if !self.is_open() {
            return WriteFuture::failed(self.closed_error());
        }
        let (done, rx) = oneshot::channel();
        match self.inner.commands.send(Command::Write { message, then, done }) {
            Ok(()) => WriteFuture::new(rx),
            Err(_) => WriteFuture::failed(self.closed_error()),
        }
    }

    /// Run a task on the channel's context
    ///
    /// Fails if the channel has already shut down; the task is dropped.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerContext<'_>) + Send + 'static,
    {
        self.inner
            .commands
            .send(Command::Execute(Box::new(task)))
            .map_err(|_| self.closed_error())
    }

    /// Request the channel to close; idempotent
    pub fn close(&self) {
        if self.inner.commands.send(Command::Close).is_err() {
            trace!("{} already shut down", self);
        }
    }

    /// Resolves once the channel has closed and its handlers have seen
    /// the inactive event
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.closed.subscribe();
        async move {
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }

    /// Inspect the pipeline on the channel's context
    pub async fn with_pipeline<F, R>(&self, inspect: F) -> Result<R>
    where
        F: FnOnce(&Pipeline) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.execute(move |ctx| {
            let _ = tx.send(inspect(ctx.pipeline()));
        })?;
        rx.await.map_err(|_| self.closed_error())
    }

    /// Names of the pipeline's stages, in order
    pub async fn stage_names(&self) -> Result<Vec<String>> {
        self.with_pipeline(Pipeline::names).await
    }

    fn closed_error(&self) -> NetconfError {
        NetconfError::ChannelClosed(self.to_string())
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.open.store(false, Ordering::Release);
    }

    pub(crate) fn notify_closed(&self) {
        self.inner.closed.send_replace(true);
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{} ({})", self.inner.id, self.inner.peer)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Completion of one write
///
/// Resolves once the encoded bytes have been handed to the stream, or with
/// the error that prevented it.
pub struct WriteFuture {
    rx: oneshot::Receiver<Result<()>>,
}

impl WriteFuture {
    fn new(rx: oneshot::Receiver<Result<()>>) -> Self {
        Self { rx }
    }

    /// A write that has already failed
    pub(crate) fn failed(error: NetconfError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { rx }
    }
}

impl Future for WriteFuture {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(NetconfError::ChannelClosed(
                "write dropped before completion".into(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub(crate) struct PendingWrite {
    pub(crate) bytes: Bytes,
    pub(crate) done: oneshot::Sender<Result<()>>,
}

/// Mutable state of a channel, owned by its driver
pub(crate) struct ChannelState {
    pub(crate) pipeline: Pipeline,
    pub(crate) outbound: VecDeque<PendingWrite>,
    pub(crate) close_requested: bool,
}

impl ChannelState {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            outbound: VecDeque::new(),
            close_requested: false,
        }
    }

    pub(crate) fn fail_outbound(&mut self, error: &NetconfError) {
        for write in self.outbound.drain(..) {
            let _ = write.done.send(Err(error.clone()));
        }
    }
}

/// Access to the channel from within a handler or scheduled task
pub struct HandlerContext<'a> {
    channel: &'a Channel,
    state: &'a mut ChannelState,
    current: Option<&'a str>,
    self_action: Option<SelfAction>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(channel: &'a Channel, state: &'a mut ChannelState, current: Option<&'a str>) -> Self {
        Self {
            channel,
            state,
            current,
            self_action: None,
        }
    }

    pub(crate) fn into_self_action(self) -> Option<SelfAction> {
        self.self_action
    }

    pub fn channel(&self) -> &Channel {
        self.channel
    }

    /// Name of the running handler; `None` inside a scheduled task
    pub fn stage_name(&self) -> Option<&str> {
        self.current
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.state.pipeline
    }

    /// Encode `message` with the current encoder and queue it for writing
    pub fn write(&mut self, message: &NetconfMessage) -> WriteFuture {
        let (done, rx) = oneshot::channel();
        self.enqueue(message, done);
        WriteFuture::new(rx)
    }

    pub(crate) fn enqueue(&mut self, message: &NetconfMessage, done: oneshot::Sender<Result<()>>) {
        if self.state.close_requested || !self.channel.is_open() {
            let _ = done.send(Err(NetconfError::ChannelClosed(self.channel.to_string())));
            return;
        }
        let Some(encoder) = self.state.pipeline.message_encoder_mut() else {
            let _ = done.send(Err(NetconfError::NoSuchStage(names::MESSAGE_ENCODER.into())));
            return;
        };
        let mut buf = BytesMut::new();
        match encoder.encode(message, &mut buf) {
            Ok(()) => self.state.outbound.push_back(PendingWrite {
                bytes: buf.freeze(),
                done,
            }),
            Err(e) => {
                let _ = done.send(Err(e));
            }
        }
    }

    /// Close the channel once the current callback returns
    pub fn close(&mut self) {
        self.state.close_requested = true;
    }

    pub fn is_closing(&self) -> bool {
        self.state.close_requested || !self.channel.is_open()
    }

    pub fn add_last(&mut self, name: impl Into<String>, stage: Stage) -> Result<()> {
        self.state.pipeline.add_last(name, stage)
    }

    /// Replace a stage other than the running handler
    pub fn replace(&mut self, old_name: &str, new_name: impl Into<String>, stage: Stage) -> Result<Stage> {
        self.state.pipeline.replace(old_name, new_name, stage)
    }

    /// Remove a stage other than the running handler
    pub fn remove(&mut self, name: &str) -> Result<Stage> {
        self.state.pipeline.remove(name)
    }

    /// Replace the running handler once it returns
    pub fn replace_self(&mut self, new_name: impl Into<String>, handler: impl ChannelHandler) -> Result<()> {
        let Some(current) = self.current else {
            return Err(NetconfError::NoSuchStage("<no running handler>".into()));
        };
        let new_name = new_name.into();
        if new_name != current && self.state.pipeline.contains(&new_name) {
            return Err(NetconfError::Configuration(format!(
                "duplicate pipeline stage '{}'",
                new_name
            )));
        }
        self.self_action = Some(SelfAction::Replace(new_name, Box::new(handler)));
        Ok(())
    }

    /// Remove the running handler once it returns
    pub fn remove_self(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(NetconfError::NoSuchStage("<no running handler>".into()));
        }
        self.self_action = Some(SelfAction::Remove);
        Ok(())
    }
}
