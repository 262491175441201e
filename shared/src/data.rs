use std::string::FromUtf8Error;

use crate::JsdtError;

/// Delivery priority of a piece of [`Data`]. Ordering is only guaranteed
/// between Data sent by one sender at one priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Top,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Priority::Top => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

/// Opaque structured encoding for application payloads carried in [`Data`]
/// and ByteArray values
pub trait Codec: Sized {
    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> Result<Self, JsdtError>;
}

impl Codec for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, JsdtError> {
        String::from_utf8(bytes.to_vec()).map_err(|e: FromUtf8Error| JsdtError::InvalidData {
            reason: e.to_string(),
        })
    }
}

impl Codec for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode(bytes: &[u8]) -> Result<Self, JsdtError> {
        Ok(bytes.to_vec())
    }
}

/// An immutable envelope sent over a Channel. The sender and channel names
/// are stamped by the channel host when the Data is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    bytes: Vec<u8>,
    priority: Priority,
    sender_name: String,
    channel_name: String,
}

impl Data {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            priority: Priority::default(),
            sender_name: String::new(),
            channel_name: String::new(),
        }
    }

    pub fn from_string(text: &str) -> Self {
        Self::new(text.as_bytes())
    }

    pub fn from_object<T: Codec>(object: &T) -> Self {
        Self::new(object.encode())
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn stamped(mut self, sender_name: &str, channel_name: &str) -> Self {
        self.sender_name = sender_name.to_string();
        self.channel_name = channel_name.to_string();
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn as_object<T: Codec>(&self) -> Result<T, JsdtError> {
        T::decode(&self.bytes)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }
}
