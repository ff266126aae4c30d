use bytes::Bytes;
use std::borrow::Cow;

/// One complete message read from an event stream.
///
/// Fields that never appeared before the terminating blank line are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub data: Bytes,
}

impl Event {
    /// The data payload as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
