//! Message decoders turning complete frames into messages

use super::document::root_local_name;
use super::{HelloMessage, NetconfMessage};
use crate::traits::{DecodedMessage, MessageDecoder, NetconfError, Result};
use bytes::Bytes;

fn frame_to_document(frame: Bytes) -> Result<String> {
    String::from_utf8(frame.to_vec())
        .map_err(|e| NetconfError::MalformedDocument(format!("frame is not valid UTF-8: {}", e)))
}

/// Decoder installed while negotiating: recognises hello documents
///
/// Non-hello documents are passed through as data messages so the
/// negotiator can reject them.
#[derive(Debug, Default)]
pub struct HelloMessageDecoder;

impl MessageDecoder for HelloMessageDecoder {
    fn name(&self) -> &'static str {
        "hello-message-decoder"
    }

    fn decode(&mut self, frame: Bytes) -> Result<DecodedMessage> {
        let document = frame_to_document(frame)?;
        if HelloMessage::is_hello_document(&document)? {
            Ok(DecodedMessage::Hello(HelloMessage::from_document(&document)?))
        } else {
            Ok(DecodedMessage::Message(NetconfMessage::new(document)))
        }
    }
}

/// Decoder installed once the session is established
#[derive(Debug, Default)]
pub struct DocumentDecoder;

impl MessageDecoder for DocumentDecoder {
    fn name(&self) -> &'static str {
        "document-decoder"
    }

    fn decode(&mut self, frame: Bytes) -> Result<DecodedMessage> {
        let document = frame_to_document(frame)?;
        root_local_name(&document)?;
        Ok(DecodedMessage::Message(NetconfMessage::new(document)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CapabilitySet;

    #[test]
    fn test_hello_decoder_recognises_hello() {
        let hello = HelloMessage::new(CapabilitySet::base()).with_session_id(3);
        let decoded = HelloMessageDecoder
            .decode(Bytes::from(hello.to_document()))
            .unwrap();
        assert_eq!(decoded, DecodedMessage::Hello(hello));
    }

    #[test]
    fn test_hello_decoder_passes_other_documents_through() {
        let decoded = HelloMessageDecoder
            .decode(Bytes::from_static(b"<rpc message-id=\"1\"/>"))
            .unwrap();
        assert!(matches!(decoded, DecodedMessage::Message(_)));
    }

    #[test]
    fn test_document_decoder_rejects_non_xml() {
        let err = DocumentDecoder.decode(Bytes::from_static(b"garbage")).unwrap_err();
        assert!(matches!(err, NetconfError::MalformedDocument(_)));

        let err = DocumentDecoder
            .decode(Bytes::from_static(&[0x3c, 0xff, 0xfe]))
            .unwrap_err();
        assert!(matches!(err, NetconfError::MalformedDocument(_)));
    }
}
