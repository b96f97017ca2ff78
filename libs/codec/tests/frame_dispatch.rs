//! # Codec Integration Tests
//!
//! Exercises the public API the network layer relies on:
//! - Arbitrary input never panics the dispatcher
//! - Tagged payloads reach the handler registered for their tag
//! - The same table shape works with either serializer

use courier_codec::{
    encode_frame, tag_only_frame, BincodeSerializer, DispatchError, DispatchTable, Dispatcher,
    Frame, JsonSerializer, Serializer,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Command {
    Start { id: u32 },
    Stop,
}

fn command_dispatcher<S: Serializer>(serializer: S) -> (Dispatcher, Arc<Mutex<Vec<Command>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let table = DispatchTable::builder(serializer)
        .on::<Command, _>(10, move |cmd| sink.lock().unwrap().push(cmd))
        .unwrap()
        .build();
    (Dispatcher::new(table), seen)
}

fn deliver_commands<S: Serializer>(serializer: S) {
    let (dispatcher, seen) = command_dispatcher(serializer.clone());
    let commands = vec![Command::Start { id: 1 }, Command::Stop, Command::Start { id: 2 }];

    for cmd in &commands {
        let frame = encode_frame(&serializer, 10, cmd).unwrap();
        assert_eq!(dispatcher.dispatch(&frame), Ok(10));
    }

    assert_eq!(*seen.lock().unwrap(), commands);
}

#[test]
fn test_delivery_with_bincode() {
    deliver_commands(BincodeSerializer);
}

#[test]
fn test_delivery_with_json() {
    deliver_commands(JsonSerializer);
}

#[test]
fn test_frames_from_one_serializer_rejected_by_other() {
    let (dispatcher, seen) = command_dispatcher(JsonSerializer);
    let frame = encode_frame(&BincodeSerializer, 10, &Command::Start { id: 5 }).unwrap();

    assert!(matches!(
        dispatcher.dispatch(&frame),
        Err(DispatchError::Payload { tag: 10, .. })
    ));
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_tag_only_frame_for_unregistered_tag() {
    let (dispatcher, _) = command_dispatcher(BincodeSerializer);
    assert_eq!(
        dispatcher.dispatch(&tag_only_frame(11)),
        Err(DispatchError::UnknownTag { tag: 11, len: 4 })
    );
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let (dispatcher, _) = command_dispatcher(BincodeSerializer);
        let outcome = dispatcher.dispatch(&bytes);

        match Frame::parse(&bytes) {
            Err(_) => prop_assert!(matches!(outcome, Err(DispatchError::FrameTooShort { .. })), "outcome: {:?}", outcome),
            Ok(frame) if frame.tag() != 10 => {
                let expected = DispatchError::UnknownTag { tag: frame.tag(), len: bytes.len() };
                prop_assert_eq!(outcome, Err(expected));
            }
            Ok(_) => prop_assert!(outcome.is_ok() || matches!(outcome, Err(DispatchError::Payload { .. })), "outcome: {:?}", outcome),
        }
    }

    #[test]
    fn payload_is_the_suffix_after_the_tag(tag in any::<u32>(), payload in prop::collection::vec(any::<u8>(), 0..32)) {
        let mut bytes = tag_only_frame(tag).to_vec();
        bytes.extend_from_slice(&payload);

        let frame = Frame::parse(&bytes).unwrap();
        prop_assert_eq!(frame.tag(), tag);
        prop_assert_eq!(frame.payload(), &payload[..]);
    }
}
