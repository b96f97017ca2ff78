//! Frame layout
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ type tag (u32, LE)   │ payload (N bytes, N ≥ 0) │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The tag is read through a zerocopy view of the first four bytes; the
//! payload is a sub-slice of the received buffer. No tag value is reserved.

use crate::error::{CodecResult, DispatchError};
use crate::serializer::Serializer;
use bytes::{BufMut, Bytes, BytesMut};
use courier_config::protocol::TYPE_TAG_SIZE;
use serde::Serialize;
use std::mem::size_of;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Ref, Unaligned};

/// Initial buffer reservation for an encoded frame
const FRAME_CAPACITY_HINT: usize = 64;

/// Wire header of an application frame
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    tag: U32,
}

const _: () = assert!(size_of::<FrameHeader>() == TYPE_TAG_SIZE);

impl FrameHeader {
    pub fn new(tag: u32) -> Self {
        Self { tag: U32::new(tag) }
    }

    pub fn tag(&self) -> u32 {
        self.tag.get()
    }
}

/// Borrowed view of a received frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    header: &'a FrameHeader,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split `bytes` into tag header and payload without copying
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DispatchError> {
        let (header, payload) = Ref::<_, FrameHeader>::new_unaligned_from_prefix(bytes).ok_or(
            DispatchError::FrameTooShort {
                need: TYPE_TAG_SIZE,
                got: bytes.len(),
            },
        )?;

        Ok(Self {
            header: header.into_ref(),
            payload,
        })
    }

    pub fn tag(&self) -> u32 {
        self.header.tag()
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Total frame length including the tag
    pub fn len(&self) -> usize {
        TYPE_TAG_SIZE + self.payload.len()
    }

    pub fn is_tag_only(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Serialize `value` behind a type tag into a fresh, immutable frame
pub fn encode_frame<S, T>(serializer: &S, tag: u32, value: &T) -> CodecResult<Bytes>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut buf = BytesMut::with_capacity(FRAME_CAPACITY_HINT);
    buf.put_slice(FrameHeader::new(tag).as_bytes());
    serializer.serialize(value, &mut buf)?;
    Ok(buf.freeze())
}

/// Frame carrying only a type tag
pub fn tag_only_frame(tag: u32) -> Bytes {
    Bytes::copy_from_slice(FrameHeader::new(tag).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::BincodeSerializer;

    #[test]
    fn test_tag_is_little_endian() {
        let frame = tag_only_frame(0x0403_0201);
        assert_eq!(&frame[..], &[0x01, 0x02, 0x03, 0x04]);

        let parsed = Frame::parse(&frame).unwrap();
        assert_eq!(parsed.tag(), 0x0403_0201);
        assert!(parsed.is_tag_only());
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_payload_follows_tag() {
        let frame = encode_frame(&BincodeSerializer, 7, &0xAABB_u16).unwrap();
        assert_eq!(frame.len(), 6);

        let parsed = Frame::parse(&frame).unwrap();
        assert_eq!(parsed.tag(), 7);
        assert_eq!(parsed.payload(), &[0xBB, 0xAA]);
        // Payload is a view into the original buffer.
        assert_eq!(parsed.payload().as_ptr(), frame[4..].as_ptr());
    }

    #[test]
    fn test_short_frames_rejected() {
        for len in 0..TYPE_TAG_SIZE {
            let bytes = vec![0u8; len];
            assert_eq!(
                Frame::parse(&bytes).unwrap_err(),
                DispatchError::FrameTooShort { need: 4, got: len }
            );
        }
    }

    #[test]
    fn test_extreme_tags() {
        for tag in [0, 1, u32::MAX] {
            let frame = tag_only_frame(tag);
            assert_eq!(Frame::parse(&frame).unwrap().tag(), tag);
        }
    }
}
