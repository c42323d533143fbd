//! Property tests for struct codecs and protocol chains.

use std::sync::Arc;

use proptest::prelude::*;
use wirechain::binary::{FieldOptions, FieldTypeRegistry, StructInstance, Value};
use wirechain::protocol::{Message, MsgPackProtocol, SizedProtocol, ZlibProtocol};
use wirechain::{ProtocolChain, StructDescriptor};

fn record_layout() -> Arc<StructDescriptor> {
    let registry = FieldTypeRegistry::standard();
    StructDescriptor::builder(&registry, "Record")
        .static_bytes(b"RC")
        .field("id", "nint32", FieldOptions::new())
        .field("flags", "uint8", FieldOptions::new())
        .field("name", "string", FieldOptions::new().sizeof("uint16"))
        .field("samples", "list", FieldOptions::new().of("lint16").sizeof("uint8"))
        .build()
        .unwrap()
}

fn record(
    layout: &Arc<StructDescriptor>,
    id: u32,
    flags: u8,
    name: &str,
    samples: &[u16],
) -> StructInstance {
    layout
        .instantiate()
        .with("id", id)
        .unwrap()
        .with("flags", flags)
        .unwrap()
        .with("name", name)
        .unwrap()
        .with(
            "samples",
            Value::List(samples.iter().map(|s| Value::from(*s)).collect()),
        )
        .unwrap()
}

fn stack() -> ProtocolChain {
    ProtocolChain::builder()
        .stage(MsgPackProtocol::new())
        .stage(ZlibProtocol::new())
        .stage(SizedProtocol::new())
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_struct_roundtrip(
        id in any::<u32>(),
        flags in any::<u8>(),
        name in "[a-z]{0,24}",
        samples in prop::collection::vec(any::<u16>(), 0..16),
    ) {
        let layout = record_layout();
        let inst = record(&layout, id, flags, &name, &samples);

        let wire = layout.encode(&inst).unwrap();
        let (decoded, used) = layout.decode(&wire).unwrap();
        prop_assert_eq!(used, wire.len());
        prop_assert_eq!(&decoded, &inst);
        prop_assert_eq!(layout.encode(&decoded).unwrap(), wire);
    }

    #[test]
    fn test_trailing_bytes_are_left_alone(
        id in any::<u32>(),
        name in "[a-z]{0,24}",
        samples in prop::collection::vec(any::<u16>(), 0..16),
        extra in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let layout = record_layout();
        let inst = record(&layout, id, 0, &name, &samples);
        let wire = layout.encode(&inst).unwrap();

        let mut longer = wire.to_vec();
        longer.extend_from_slice(&extra);
        let (decoded, used) = layout.decode(&longer).unwrap();
        prop_assert_eq!(used, wire.len());
        prop_assert_eq!(decoded, inst);
    }

    #[test]
    fn test_every_prefix_is_incomplete(
        id in any::<u32>(),
        name in "[a-z]{0,24}",
        samples in prop::collection::vec(any::<u16>(), 0..16),
    ) {
        let layout = record_layout();
        let wire = layout.encode(&record(&layout, id, 1, &name, &samples)).unwrap();

        for cut in 0..wire.len() {
            let err = layout.decode(&wire[..cut]).unwrap_err();
            prop_assert!(err.is_incomplete(), "prefix {} gave {}", cut, err);
        }
    }

    #[test]
    fn test_chain_survives_any_chunking(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..8),
        chunks in prop::collection::vec(1usize..64, 1..8),
    ) {
        let mut tx = stack();
        let mut wire = Vec::new();
        for p in &payloads {
            wire.extend_from_slice(&tx.encode(Message::from(p.clone())).unwrap());
        }

        let mut rx = stack();
        let mut decoded = Vec::new();
        let mut pos = 0;
        for size in chunks.iter().cycle() {
            if pos >= wire.len() {
                break;
            }
            let end = (pos + size).min(wire.len());
            decoded.extend(rx.decode(&wire[pos..end]).unwrap());
            pos = end;
        }

        let expected: Vec<Message> = payloads.into_iter().map(Message::from).collect();
        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(rx.buffered(), 0);
        prop_assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn test_chain_composition_matches_stage_by_stage(
        payload in prop::collection::vec(any::<u8>(), 0..300),
    ) {
        use wirechain::protocol::Protocol;

        let mut chain = stack();
        let wire = chain.encode(Message::from(payload.clone())).unwrap();

        let mut frame = Message::from(payload);
        let mut stages: Vec<Box<dyn Protocol>> = vec![
            Box::new(MsgPackProtocol::new()),
            Box::new(ZlibProtocol::new()),
            Box::new(SizedProtocol::new()),
        ];
        for stage in stages.iter_mut() {
            frame = stage.encode(frame).unwrap().remove(0);
        }
        prop_assert_eq!(frame, Message::Bytes(wire));
    }
}
