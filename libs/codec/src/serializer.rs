//! Pluggable payload serialization
//!
//! A [`Serializer`] writes a value straight into an outgoing frame buffer and
//! reads one back from a borrowed payload slice. Two formats ship:
//! [`BincodeSerializer`] (compact, default) and [`JsonSerializer`].

use crate::error::{CodecError, CodecResult};
use bytes::BufMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Serializer: Clone + Send + Sync + 'static {
    /// Short format name used in diagnostics
    fn format(&self) -> &'static str;

    /// Append the encoding of `value` to `out`
    fn serialize<T, B>(&self, value: &T, out: &mut B) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        B: BufMut;

    /// Decode a value from `bytes`
    fn deserialize<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned;
}

/// bincode 1.x with its default (fixed-int, little-endian) options
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn format(&self) -> &'static str {
        "bincode"
    }

    fn serialize<T, B>(&self, value: &T, out: &mut B) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        B: BufMut,
    {
        bincode::serialize_into(out.writer(), value)
            .map_err(|e| CodecError::serialize::<T>(self.format(), e))
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned,
    {
        bincode::deserialize(bytes)
            .map_err(|e| CodecError::deserialize::<T>(self.format(), bytes.len(), e))
    }
}

/// UTF-8 JSON, handy when frames should be readable on the wire
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn format(&self) -> &'static str {
        "json"
    }

    fn serialize<T, B>(&self, value: &T, out: &mut B) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        B: BufMut,
    {
        serde_json::to_writer(out.writer(), value)
            .map_err(|e| CodecError::serialize::<T>(self.format(), e))
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::deserialize::<T>(self.format(), bytes.len(), e))
    }
}
