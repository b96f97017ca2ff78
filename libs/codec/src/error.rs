//! Codec and dispatch errors
//!
//! [`CodecError`] covers serializer failures and table wiring mistakes.
//! [`DispatchError`] describes a received frame that could not be routed;
//! it is cloneable so it can fan out on the dispatcher's error channel.

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Value could not be encoded by the serializer
    #[error("{format} serialization failed for {type_name}: {message}")]
    Serialize {
        format: &'static str,
        type_name: &'static str,
        message: String,
    },

    /// Payload bytes could not be decoded into the requested type
    #[error("{format} deserialization of {type_name} failed ({len} bytes): {message}")]
    Deserialize {
        format: &'static str,
        type_name: &'static str,
        len: usize,
        message: String,
    },

    /// A dispatch table already routes this tag
    #[error("type tag {tag} is already registered for {existing}")]
    DuplicateTag { tag: u32, existing: &'static str },
}

impl CodecError {
    pub fn serialize<T: ?Sized>(format: &'static str, message: impl ToString) -> Self {
        Self::Serialize {
            format,
            type_name: std::any::type_name::<T>(),
            message: message.to_string(),
        }
    }

    pub fn deserialize<T>(format: &'static str, len: usize, message: impl ToString) -> Self {
        Self::Deserialize {
            format,
            type_name: std::any::type_name::<T>(),
            len,
            message: message.to_string(),
        }
    }
}

/// Why an inbound frame was not delivered to a handler
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Frame cannot even hold the 4-byte type tag
    #[error("frame too short: need {need} bytes for the type tag, got {got}")]
    FrameTooShort { need: usize, got: usize },

    /// No handler is registered for the tag; the frame was discarded
    #[error("no handler registered for type tag {tag} ({len} byte frame discarded)")]
    UnknownTag { tag: u32, len: usize },

    /// Handler exists but its payload did not decode
    #[error("payload for type tag {tag} rejected: {source}")]
    Payload {
        tag: u32,
        #[source]
        source: CodecError,
    },

    /// Handler panicked; the frame is lost but dispatch continues
    #[error("handler for type tag {tag} panicked: {message}")]
    HandlerPanicked { tag: u32, message: String },
}

impl DispatchError {
    /// Tag of the offending frame, when one could be read
    pub fn tag(&self) -> Option<u32> {
        match self {
            Self::FrameTooShort { .. } => None,
            Self::UnknownTag { tag, .. }
            | Self::Payload { tag, .. }
            | Self::HandlerPanicked { tag, .. } => Some(*tag),
        }
    }

    /// Build a `HandlerPanicked` error from a `catch_unwind` payload
    pub(crate) fn from_panic(tag: u32, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::HandlerPanicked { tag, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CodecError::deserialize::<u64>("bincode", 3, "unexpected end of file");
        let text = err.to_string();
        assert!(text.contains("bincode"));
        assert!(text.contains("u64"));
        assert!(text.contains("3 bytes"));

        let unknown = DispatchError::UnknownTag { tag: 99, len: 12 };
        assert_eq!(unknown.tag(), Some(99));
        assert!(unknown.to_string().contains("99"));

        let short = DispatchError::FrameTooShort { need: 4, got: 2 };
        assert_eq!(short.tag(), None);

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bad seq 0"));
        let panicked = DispatchError::from_panic(5, boxed.as_ref());
        assert_eq!(panicked.tag(), Some(5));
        assert!(panicked.to_string().contains("bad seq 0"));
    }
}
