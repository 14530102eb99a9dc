use std::any::Any;
use std::fmt;

/// A payload travelling through an interceptor chain.
///
/// Implemented for every [`prost::Message`], so generated protobuf types, `()`
/// and the well-known wrapper types (such as `String`) can be boxed into a
/// [`BoxMessage`] directly.
pub trait Message: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Length of the protobuf encoding of this message.
    fn wire_len(&self) -> usize;
}

impl<T> Message for T
where
    T: prost::Message + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn wire_len(&self) -> usize {
        prost::Message::encoded_len(self)
    }
}

/// Owned, type-erased message.
pub type BoxMessage = Box<dyn Message>;

impl dyn Message {
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Unboxes the message if it is a `T`.
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<T> {
        self.into_any().downcast::<T>().ok().map(|msg| *msg)
    }
}
