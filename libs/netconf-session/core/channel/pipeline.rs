//! Ordered list of named, replaceable stages

use crate::traits::{ChannelHandler, FrameDecoder, MessageDecoder, MessageEncoder, NetconfError, Result};
use std::fmt;

/// Well-known stage names
pub mod names {
    pub const FRAME_DECODER: &str = "frame-decoder";
    pub const MESSAGE_DECODER: &str = "message-decoder";
    pub const MESSAGE_ENCODER: &str = "message-encoder";
    pub const NEGOTIATOR: &str = "negotiator";
    pub const SESSION: &str = "session";
    pub const NEGOTIATION_EXCEPTION_HANDLER: &str = "negotiation-exception-handler";
}

/// One processing stage
pub enum Stage {
    FrameDecoder(Box<dyn FrameDecoder>),
    MessageDecoder(Box<dyn MessageDecoder>),
    MessageEncoder(Box<dyn MessageEncoder>),
    Handler(Box<dyn ChannelHandler>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    FrameDecoder,
    MessageDecoder,
    MessageEncoder,
    Handler,
}

impl Stage {
    pub fn frame_decoder(decoder: impl FrameDecoder) -> Self {
        Stage::FrameDecoder(Box::new(decoder))
    }

    pub fn message_decoder(decoder: impl MessageDecoder) -> Self {
        Stage::MessageDecoder(Box::new(decoder))
    }

    pub fn message_encoder(encoder: impl MessageEncoder) -> Self {
        Stage::MessageEncoder(Box::new(encoder))
    }

    pub fn handler(handler: impl ChannelHandler) -> Self {
        Stage::Handler(Box::new(handler))
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Stage::FrameDecoder(_) => StageKind::FrameDecoder,
            Stage::MessageDecoder(_) => StageKind::MessageDecoder,
            Stage::MessageEncoder(_) => StageKind::MessageEncoder,
            Stage::Handler(_) => StageKind::Handler,
        }
    }

    /// Implementation name of a codec stage; `None` for handlers
    pub fn implementation(&self) -> Option<&'static str> {
        match self {
            Stage::FrameDecoder(d) => Some(d.name()),
            Stage::MessageDecoder(d) => Some(d.name()),
            Stage::MessageEncoder(e) => Some(e.name()),
            Stage::Handler(_) => None,
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.implementation() {
            Some(name) => write!(f, "{:?}({})", self.kind(), name),
            None => write!(f, "{:?}", self.kind()),
        }
    }
}

enum Slot {
    Ready(Stage),
    /// A handler taken out while it handles an event
    Busy,
}

/// What a running handler asked to happen to its own slot
pub(crate) enum SelfAction {
    Replace(String, Box<dyn ChannelHandler>),
    Remove,
}

/// The ordered stage list of one channel
///
/// Lookups are by name. Replacing or removing a stage that does not exist
/// fails with [`NetconfError::NoSuchStage`]; a handler that is currently
/// running is not visible to these operations and can only replace or
/// remove itself through its context.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<(String, Slot)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|(n, slot)| n == name && matches!(slot, Slot::Ready(_)))
    }

    fn contains_name(&self, name: &str) -> bool {
        self.stages.iter().any(|(n, _)| n == name)
    }

    /// Append a stage at the tail
    pub fn add_last(&mut self, name: impl Into<String>, stage: Stage) -> Result<()> {
        let name = name.into();
        if self.contains_name(&name) {
            return Err(NetconfError::Configuration(format!(
                "duplicate pipeline stage '{}'",
                name
            )));
        }
        self.stages.push((name, Slot::Ready(stage)));
        Ok(())
    }

    /// Builder-style [`Pipeline::add_last`]
    pub fn with(mut self, name: impl Into<String>, stage: Stage) -> Result<Self> {
        self.add_last(name, stage)?;
        Ok(self)
    }

    /// Replace the stage called `old_name`, returning the stage it replaced
    pub fn replace(&mut self, old_name: &str, new_name: impl Into<String>, stage: Stage) -> Result<Stage> {
        let index = self
            .position(old_name)
            .ok_or_else(|| NetconfError::NoSuchStage(old_name.to_string()))?;
        let new_name = new_name.into();
        if new_name != old_name && self.contains_name(&new_name) {
            return Err(NetconfError::Configuration(format!(
                "duplicate pipeline stage '{}'",
                new_name
            )));
        }
        let (_, old) = std::mem::replace(&mut self.stages[index], (new_name, Slot::Ready(stage)));
        match old {
            Slot::Ready(stage) => Ok(stage),
            Slot::Busy => Err(NetconfError::NoSuchStage(old_name.to_string())),
        }
    }

    /// Remove the stage called `name`
    pub fn remove(&mut self, name: &str) -> Result<Stage> {
        let index = self
            .position(name)
            .ok_or_else(|| NetconfError::NoSuchStage(name.to_string()))?;
        match self.stages.remove(index).1 {
            Slot::Ready(stage) => Ok(stage),
            Slot::Busy => Err(NetconfError::NoSuchStage(name.to_string())),
        }
    }

    /// Kind of the stage called `name`, including a running handler
    pub fn get(&self, name: &str) -> Option<StageKind> {
        self.stages.iter().find(|(n, _)| n == name).map(|(_, slot)| match slot {
            Slot::Ready(stage) => stage.kind(),
            Slot::Busy => StageKind::Handler,
        })
    }

    /// Implementation name of the codec stage called `name`
    pub fn implementation(&self, name: &str) -> Option<&'static str> {
        self.stages
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, slot)| match slot {
                Slot::Ready(stage) => stage.implementation(),
                Slot::Busy => None,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contains_name(name)
    }

    /// Stage names in order
    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn frame_decoder_mut(&mut self) -> Option<&mut (dyn FrameDecoder + 'static)> {
        self.stages.iter_mut().find_map(|(_, slot)| match slot {
            Slot::Ready(Stage::FrameDecoder(d)) => Some(d.as_mut()),
            _ => None,
        })
    }

    pub(crate) fn message_decoder_mut(&mut self) -> Option<&mut (dyn MessageDecoder + 'static)> {
        self.stages.iter_mut().find_map(|(_, slot)| match slot {
            Slot::Ready(Stage::MessageDecoder(d)) => Some(d.as_mut()),
            _ => None,
        })
    }

    pub(crate) fn message_encoder_mut(&mut self) -> Option<&mut (dyn MessageEncoder + 'static)> {
        self.stages.iter_mut().find_map(|(_, slot)| match slot {
            Slot::Ready(Stage::MessageEncoder(e)) => Some(e.as_mut()),
            _ => None,
        })
    }

    /// Take out the first handler at or after `from`, leaving its slot busy
    pub(crate) fn take_handler(&mut self, from: usize) -> Option<(String, Box<dyn ChannelHandler>)> {
        let index = self
            .stages
            .iter()
            .skip(from)
            .position(|(_, slot)| matches!(slot, Slot::Ready(Stage::Handler(_))))?
            + from;
        let (name, slot) = &mut self.stages[index];
        match std::mem::replace(slot, Slot::Busy) {
            Slot::Ready(Stage::Handler(handler)) => Some((name.clone(), handler)),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Put a running handler back, applying what it asked for itself
    ///
    /// Returns the index to continue searching for the next handler from.
    pub(crate) fn restore_handler(
        &mut self,
        handler: Box<dyn ChannelHandler>,
        action: Option<SelfAction>,
    ) -> usize {
        let Some(index) = self
            .stages
            .iter()
            .position(|(_, slot)| matches!(slot, Slot::Busy))
        else {
            return self.stages.len();
        };

        match action {
            None => {
                self.stages[index].1 = Slot::Ready(Stage::Handler(handler));
                index + 1
            }
            Some(SelfAction::Replace(name, replacement)) => {
                self.stages[index] = (name, Slot::Ready(Stage::Handler(replacement)));
                index + 1
            }
            Some(SelfAction::Remove) => {
                self.stages.remove(index);
                index
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (name, slot) in &self.stages {
            match slot {
                Slot::Ready(stage) => list.entry(&format_args!("{}: {:?}", name, stage)),
                Slot::Busy => list.entry(&format_args!("{}: <running>", name)),
            };
        }
        list.finish()
    }
}
