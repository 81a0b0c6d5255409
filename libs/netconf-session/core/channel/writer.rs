use super::PendingWrite;
use crate::traits::{AsyncStream, NetconfError};
use futures::SinkExt;
use tokio::io::WriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{BytesCodec, FramedWrite};
use tracing::{trace, warn};

/// The outbound half of a connection
///
/// Messages are encoded on the channel's context and arrive here as bytes,
/// in order. Writing runs on its own task so a peer that is slow to read
/// never keeps the channel from reading.
pub(crate) struct ChannelWriter {
    label: String,
    sink: FramedWrite<WriteHalf<Box<dyn AsyncStream>>, BytesCodec>,
    writes: mpsc::UnboundedReceiver<PendingWrite>,
    failures: mpsc::UnboundedSender<NetconfError>,
}

impl ChannelWriter {
    /// Start writing; dropping the returned sender drains the queue and
    /// shuts the stream's write side down
    pub(crate) fn spawn(
        label: String,
        io: WriteHalf<Box<dyn AsyncStream>>,
        failures: mpsc::UnboundedSender<NetconfError>,
    ) -> (mpsc::UnboundedSender<PendingWrite>, JoinHandle<()>) {
        let (tx, writes) = mpsc::unbounded_channel();
        let writer = Self {
            label,
            sink: FramedWrite::new(io, BytesCodec::new()),
            writes,
            failures,
        };
        (tx, tokio::spawn(writer.run()))
    }

    async fn run(mut self) {
        while let Some(write) = self.writes.recv().await {
            let len = write.bytes.len();
            match self.sink.send(write.bytes).await {
                Ok(()) => {
                    trace!("{} wrote {} bytes", self.label, len);
                    let _ = write.done.send(Ok(()));
                }
                Err(e) => {
                    let error = NetconfError::from(e);
                    warn!("{} write failed: {}", self.label, error);
                    let _ = write.done.send(Err(error.clone()));
                    self.abandon(error);
                    return;
                }
            }
        }

        if let Err(e) = SinkExt::<bytes::Bytes>::close(&mut self.sink).await {
            trace!("{} shutdown: {}", self.label, e);
        }
    }

    /// Fail everything still queued and report the error to the channel
    fn abandon(mut self, error: NetconfError) {
        self.writes.close();
        while let Ok(write) = self.writes.try_recv() {
            let _ = write.done.send(Err(error.clone()));
        }
        let _ = self.failures.send(error);
    }
}
