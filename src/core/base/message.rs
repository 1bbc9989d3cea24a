use crate::utils::AsAny;
use crate::Result;
use std::fmt;

/// A request or response payload travelling through the interceptor chain.
///
/// Payloads advertise how their size can be estimated. Every capability
/// defaults to "not supported", in which case the size estimate is zero.
pub trait Message: AsAny + fmt::Debug {
    /// Serializes the payload to wire bytes and returns their length.
    /// `None` when the type cannot serialize itself.
    fn approximate_wire_size(&self) -> Option<Result<usize>> {
        None
    }

    /// The payload viewed as a raw text/byte buffer.
    fn as_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// The payload encoded as UTF-8 text.
    fn encode_text(&self) -> Option<String> {
        None
    }
}

pub type BoxMessage = Box<dyn Message>;

/// Downcasts a type-erased payload back to its concrete type.
pub fn downcast_message<T: Message>(message: &dyn Message) -> Option<&T> {
    message.as_any().downcast_ref::<T>()
}

impl Message for String {
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(str::as_bytes(self))
    }
}

impl Message for &'static str {
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(str::as_bytes(self))
    }
}

impl Message for Vec<u8> {
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }
}

impl Message for () {}

/// Adapts any generated protobuf message to [`Message`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProstMessage<T>(pub T);

impl<T> Message for ProstMessage<T>
where
    T: prost::Message + Send + Sync + 'static,
{
    fn approximate_wire_size(&self) -> Option<Result<usize>> {
        Some(Ok(self.0.encode_to_vec().len()))
    }
}

impl<T> ProstMessage<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
