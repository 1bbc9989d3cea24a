use crate::base::Message;
use crate::logging;

/// Best-effort payload size in bytes. Never fails: anything that cannot be
/// measured counts as zero.
pub fn estimate_message_size(message: Option<&dyn Message>) -> usize {
    let message = match message {
        Some(message) => message,
        None => return 0,
    };
    if let Some(wire_size) = message.approximate_wire_size() {
        return match wire_size {
            Ok(size) => size,
            Err(err) => {
                logging::debug!("[RpcMetrics] Failed to serialize message for sizing, error {}", err);
                0
            }
        };
    }
    if let Some(bytes) = message.as_bytes() {
        return bytes.len();
    }
    if let Some(text) = message.encode_text() {
        return text.len();
    }
    0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::ProstMessage;
    use crate::{Error, Result};

    #[derive(Debug)]
    struct Encodable;

    impl Message for Encodable {
        fn encode_text(&self) -> Option<String> {
            Some("encoded message".into())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Message for Broken {
        fn approximate_wire_size(&self) -> Option<Result<usize>> {
            Some(Err(Error::msg("Serialization error")))
        }

        fn as_bytes(&self) -> Option<&[u8]> {
            Some(b"never used")
        }
    }

    #[derive(Debug)]
    struct Opaque;

    impl Message for Opaque {}

    #[test]
    fn estimates() {
        assert_eq!(estimate_message_size(None), 0);
        assert_eq!(estimate_message_size(Some(&String::from("test request"))), 12);
        assert_eq!(estimate_message_size(Some(&vec![0u8; 3])), 3);
        assert_eq!(estimate_message_size(Some(&"héllo")), 6);
        assert_eq!(estimate_message_size(Some(&Encodable)), "encoded message".len());
        assert_eq!(estimate_message_size(Some(&Broken)), 0);
        assert_eq!(estimate_message_size(Some(&Opaque)), 0);
        assert_eq!(estimate_message_size(Some(&())), 0);
        assert_eq!(estimate_message_size(Some(&ProstMessage(String::from("abc")))), 5);
    }
}
