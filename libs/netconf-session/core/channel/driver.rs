use super::writer::ChannelWriter;
use super::{Channel, ChannelState, Command, HandlerContext, PendingWrite, Pipeline};
use crate::traits::{AsyncStream, ChannelEvent, DecodedMessage, InboundEvent, NetconfError};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tracing::{debug, trace, warn};

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// How long a closing channel waits for queued bytes to reach the peer
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The task owning one connection
///
/// Reading, handler callbacks and encoding run here; encoded bytes are
/// handed to the [`ChannelWriter`] task so reading never waits on a write.
pub(crate) struct ChannelDriver {
    channel: Channel,
    commands: mpsc::UnboundedReceiver<Command>,
    reader: ReadHalf<Box<dyn AsyncStream>>,
    inbound: BytesMut,
    state: ChannelState,
    writes: Option<mpsc::UnboundedSender<PendingWrite>>,
    writer: Option<JoinHandle<()>>,
    write_failures: mpsc::UnboundedReceiver<NetconfError>,
}

impl ChannelDriver {
    pub(crate) fn new(
        channel: Channel,
        commands: mpsc::UnboundedReceiver<Command>,
        io: Box<dyn AsyncStream>,
        pipeline: Pipeline,
    ) -> Self {
        let (reader, writer) = tokio::io::split(io);
        let (failures, write_failures) = mpsc::unbounded_channel();
        let (writes, writer) = ChannelWriter::spawn(channel.to_string(), writer, failures);
        Self {
            channel,
            commands,
            reader,
            inbound: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            state: ChannelState::new(pipeline),
            writes: Some(writes),
            writer: Some(writer),
            write_failures,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("{} active, pipeline {:?}", self.channel, self.state.pipeline);
        self.dispatch(ChannelEvent::Active);

        loop {
            self.hand_off_writes();
            if self.state.close_requested {
                break;
            }
            self.inbound.reserve(READ_BUFFER_CAPACITY);

            tokio::select! {
                biased;

                Some(command) = self.commands.recv() => self.on_command(command),

                Some(error) = self.write_failures.recv() => self.write_failed(error),

                read = self.reader.read_buf(&mut self.inbound) => match read {
                    Ok(0) => {
                        if !self.inbound.is_empty() {
                            debug!("{} discarding {} trailing bytes", self.channel, self.inbound.len());
                        }
                        debug!("{} reached end of stream", self.channel);
                        break;
                    }
                    Ok(n) => {
                        trace!("{} read {} bytes", self.channel, n);
                        self.decode_inbound();
                    }
                    Err(e) => {
                        warn!("{} read failed: {}", self.channel, e);
                        self.state.close_requested = true;
                        self.dispatch(ChannelEvent::Inbound(InboundEvent::StreamError(e.into())));
                    }
                },
            }
        }

        self.shutdown().await;
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Write { message, then, done } => {
                let mut ctx = HandlerContext::new(&self.channel, &mut self.state, None);
                ctx.enqueue(&message, done);
                if let Some(then) = then {
                    then(&mut ctx);
                }
            }
            Command::Execute(task) => {
                let mut ctx = HandlerContext::new(&self.channel, &mut self.state, None);
                task(&mut ctx);
            }
            Command::Close => {
                debug!("{} close requested", self.channel);
                self.state.close_requested = true;
            }
        }
    }

    /// Decode and dispatch every complete frame in the inbound buffer
    ///
    /// Frames are taken one at a time; stages replaced while handling a
    /// frame are used for the next one.
    fn decode_inbound(&mut self) {
        while !self.state.close_requested && !self.inbound.is_empty() {
            let Some(decoder) = self.state.pipeline.frame_decoder_mut() else {
                self.fatal(NetconfError::NoSuchStage(super::names::FRAME_DECODER.into()));
                return;
            };

            let frame = match decoder.decode(&mut self.inbound) {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) if e.is_fatal() => {
                    self.fatal(e);
                    return;
                }
                Err(e) => {
                    self.dispatch(ChannelEvent::Inbound(InboundEvent::StreamError(e)));
                    continue;
                }
            };

            let Some(decoder) = self.state.pipeline.message_decoder_mut() else {
                self.fatal(NetconfError::NoSuchStage(super::names::MESSAGE_DECODER.into()));
                return;
            };

            let event = match decoder.decode(frame) {
                Ok(DecodedMessage::Hello(hello)) => InboundEvent::Hello(hello),
                Ok(DecodedMessage::Message(message)) => InboundEvent::Message(message),
                Err(e) => InboundEvent::StreamError(e),
            };
            self.dispatch(ChannelEvent::Inbound(event));
        }
    }

    fn fatal(&mut self, error: NetconfError) {
        warn!("{} fatal stream error: {}", self.channel, error);
        self.state.close_requested = true;
        self.dispatch(ChannelEvent::Inbound(InboundEvent::StreamError(error)));
    }

    /// Run an event through the handler stages, head to tail
    fn dispatch(&mut self, event: ChannelEvent) {
        let mut from = 0;
        let mut pending = Some(event);

        while let Some(event) = pending.take() {
            let Some((name, mut handler)) = self.state.pipeline.take_handler(from) else {
                match event {
                    ChannelEvent::Inbound(InboundEvent::StreamError(e)) => {
                        warn!("{} unhandled error reached end of pipeline: {}", self.channel, e)
                    }
                    other => trace!("{} event reached end of pipeline: {:?}", self.channel, other),
                }
                return;
            };

            let mut ctx = HandlerContext::new(&self.channel, &mut self.state, Some(&name));
            pending = handler.handle(&mut ctx, event);
            let action = ctx.into_self_action();
            from = self.state.pipeline.restore_handler(handler, action);
        }
    }

    /// Pass everything encoded so far to the writer task
    fn hand_off_writes(&mut self) {
        while let Some(write) = self.state.outbound.pop_front() {
            let rejected = match &self.writes {
                Some(writes) => writes.send(write).err().map(|e| e.0),
                None => Some(write),
            };
            if let Some(write) = rejected {
                let _ = write
                    .done
                    .send(Err(NetconfError::ChannelClosed(self.channel.to_string())));
            }
        }
    }

    fn write_failed(&mut self, error: NetconfError) {
        self.state.fail_outbound(&error);
        self.state.close_requested = true;
        self.dispatch(ChannelEvent::Inbound(InboundEvent::StreamError(error)));
    }

    async fn shutdown(mut self) {
        self.hand_off_writes();
        // Closing the queue lets the writer finish and shut the stream down
        self.writes.take();
        if let Some(mut writer) = self.writer.take() {
            match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{} writer task failed: {}", self.channel, e),
                Err(_) => {
                    warn!("{} peer stopped reading, dropping unsent bytes", self.channel);
                    writer.abort();
                }
            }
        }

        self.channel.mark_closed();
        debug!("{} closed", self.channel);
        self.dispatch(ChannelEvent::Inactive);

        let error = NetconfError::ChannelClosed(self.channel.to_string());
        self.state.fail_outbound(&error);
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Write { done, .. } = command {
                let _ = done.send(Err(error.clone()));
            }
        }

        self.channel.notify_closed();
    }
}
