use super::capability::{CapabilitySet, BASE_NAMESPACE};
use super::document::{element_texts, escape, root_local_name, NetconfMessage};
use crate::traits::{NetconfError, Result};
use std::fmt;

/// The first message exchanged by each side, carrying its capability set
///
/// A server hello also carries the session identifier it assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    capabilities: CapabilitySet,
    session_id: Option<u64>,
}

impl HelloMessage {
    /// Create a hello without a session identifier (client side)
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            session_id: None,
        }
    }

    /// Attach a session identifier (server side)
    pub fn with_session_id(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    /// Check whether a document is a hello message without fully parsing it
    pub fn is_hello_document(document: &str) -> Result<bool> {
        Ok(root_local_name(document)? == "hello")
    }

    /// Serialize into a hello document
    pub fn to_document(&self) -> String {
        let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        doc.push_str("<hello xmlns=\"");
        doc.push_str(BASE_NAMESPACE);
        doc.push_str("\"><capabilities>");
        for capability in self.capabilities.iter() {
            doc.push_str("<capability>");
            doc.push_str(&escape(capability));
            doc.push_str("</capability>");
        }
        doc.push_str("</capabilities>");
        if let Some(id) = self.session_id {
            doc.push_str(&format!("<session-id>{}</session-id>", id));
        }
        doc.push_str("</hello>");
        doc
    }

    /// Parse a hello document
    pub fn from_document(document: &str) -> Result<Self> {
        let root = root_local_name(document)?;
        if root != "hello" {
            return Err(NetconfError::MalformedDocument(format!(
                "expected <hello>, got <{}>",
                root
            )));
        }

        let capabilities = CapabilitySet::new(element_texts(document, "capability")?);

        let session_ids = element_texts(document, "session-id")?;
        let session_id = match session_ids.as_slice() {
            [] => None,
            [id] => Some(id.parse::<u64>().map_err(|_| {
                NetconfError::MalformedDocument(format!("invalid session-id '{}'", id))
            })?),
            _ => {
                return Err(NetconfError::MalformedDocument(
                    "multiple session-id elements".into(),
                ))
            }
        };

        Ok(Self {
            capabilities,
            session_id,
        })
    }

    pub fn to_message(&self) -> NetconfMessage {
        NetconfMessage::new(self.to_document())
    }
}

impl TryFrom<&NetconfMessage> for HelloMessage {
    type Error = NetconfError;

    fn try_from(message: &NetconfMessage) -> Result<Self> {
        Self::from_document(message.document())
    }
}

impl fmt::Display for HelloMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.session_id {
            Some(id) => write!(f, "hello(session-id={}, {})", id, self.capabilities),
            None => write!(f, "hello({})", self.capabilities),
        }
    }
}
