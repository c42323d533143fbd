//! Integration tests for wirechain.
//!
//! These tests drive binary structs and protocol chains through the public
//! API, including async reads over in-memory duplex streams.

use std::time::Duration;

use serde_json::{json, Map, Value as Json};
use tokio::io::AsyncWriteExt;
use wirechain::binary::{FieldOptions, FieldTypeRegistry, Value};
use wirechain::protocol::{
    Extract, Message, MsgPackProtocol, Protocol, Reassembler, SeparatorProtocol,
    ShellwordsProtocol, SizedProtocol, StructProtocol, TextObjectProtocol, ZlibProtocol,
};
use wirechain::{ProtocolChain, Result, StructDescriptor, WirechainError};

/// Splits each byte message into its length followed by one message per byte.
struct Splitter;

impl Protocol for Splitter {
    fn name(&self) -> &str {
        "splitter"
    }

    fn decode(&mut self, input: Message) -> Result<Extract> {
        let input = input.into_bytes(self.name())?;
        let mut messages = vec![Message::Object(json!(input.len()))];
        messages.extend((0..input.len()).map(|i| Message::Bytes(input.slice(i..i + 1))));
        Ok(Extract::Yield {
            consumed: input.len(),
            messages,
        })
    }
}

/// Like [`Splitter`], but announces twice the length, and only once.
#[derive(Default)]
struct BufferedSplitter {
    announced: bool,
}

impl Protocol for BufferedSplitter {
    fn name(&self) -> &str {
        "buffered-splitter"
    }

    fn decode(&mut self, input: Message) -> Result<Extract> {
        let input = input.into_bytes(self.name())?;
        let mut messages = Vec::new();
        if !self.announced {
            messages.push(Message::Object(json!(input.len() * 2)));
            self.announced = true;
        }
        messages.extend((0..input.len()).map(|i| Message::Bytes(input.slice(i..i + 1))));
        Ok(Extract::Yield {
            consumed: input.len(),
            messages,
        })
    }
}

/// Joins the pieces announced by a leading count message.
#[derive(Default)]
struct Merger {
    stow: Reassembler,
}

fn merge(parts: &[Message], _: &Map<String, Json>) -> Result<Option<Vec<Message>>> {
    let Some(expected) = parts.first().and_then(|m| m.as_object()).and_then(Json::as_u64) else {
        return Err(WirechainError::incomplete("waiting for the piece count"));
    };
    if ((parts.len() - 1) as u64) < expected {
        return Ok(None);
    }
    let mut joined = Vec::new();
    for part in &parts[1..] {
        if let Some(bytes) = part.as_bytes() {
            joined.extend_from_slice(bytes);
        }
    }
    Ok(Some(vec![Message::from(joined)]))
}

impl Protocol for Merger {
    fn name(&self) -> &str {
        "merger"
    }

    fn decode(&mut self, input: Message) -> Result<Extract> {
        self.stow.assemble("merge", input, None, merge)
    }

    fn reset(&mut self) {
        self.stow.clear();
    }
}

fn sized() -> ProtocolChain {
    ProtocolChain::builder()
        .stage(SizedProtocol::new())
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Size framing
// ---------------------------------------------------------------------------

#[test]
fn test_size_framing_of_abcd() {
    let mut chain = sized();
    let wire = chain.encode(Message::from("abcd")).unwrap();

    assert_eq!(wire.len(), 12);
    assert_eq!(&wire[..8], &4u64.to_le_bytes());
    assert_eq!(&wire[8..], b"abcd");

    let mut stage = SizedProtocol::new();
    assert_eq!(
        stage.decode(Message::Bytes(wire)).unwrap(),
        Extract::one(12, Message::from("abcd"))
    );
}

#[tokio::test]
async fn test_many_messages_in_order() {
    let (mut w, mut r) = tokio::io::duplex(1024);
    let mut chain = sized();

    for i in 1..10 {
        let text = format!("x{i}");
        chain.write_message(&mut w, Message::from(text.into_bytes())).await.unwrap();
    }
    for i in 1..10 {
        let expected = format!("x{i}");
        assert_eq!(
            chain.read_message(&mut r).await.unwrap(),
            Message::from(expected.into_bytes())
        );
    }
    assert_eq!(chain.buffered(), 0);
    assert_eq!(chain.pending(), 0);
}

// ---------------------------------------------------------------------------
// Binary structs
// ---------------------------------------------------------------------------

#[test]
fn test_struct_with_sibling_length() {
    let registry = FieldTypeRegistry::standard();
    let desc = StructDescriptor::builder(&registry, "Data")
        .field("data_length", "uint8", FieldOptions::new())
        .field("data", "bytes", FieldOptions::new().length_of("data_length"))
        .build()
        .unwrap();

    let (inst, used) = desc.decode(&[4, b'a', b'b', b'c', b'd']).unwrap();
    assert_eq!(used, 5);
    assert_eq!(inst.get("data_length").unwrap(), Value::UInt(4));
    assert_eq!(inst.get("data").unwrap(), Value::from("abcd"));

    assert!(desc.decode(&[4, b'a', b'b']).unwrap_err().is_incomplete());
}

#[test]
fn test_struct_with_fixed_literal() {
    let registry = FieldTypeRegistry::standard();
    let desc = StructDescriptor::builder(&registry, "Magic")
        .fixed("magic", "abc")
        .build()
        .unwrap();

    let (inst, used) = desc.decode(b"abc").unwrap();
    assert_eq!(used, 3);
    assert_eq!(inst.get("magic").unwrap(), Value::from("abc"));

    assert!(desc.decode(b"abd").unwrap_err().is_corrupt());

    let wrong = desc.instantiate().with("magic", "xyz").unwrap();
    assert!(desc.encode(&wrong).unwrap_err().is_corrupt());
}

#[test]
fn test_list_of_all_remaining_bytes() {
    let registry = FieldTypeRegistry::standard();
    let desc = StructDescriptor::builder(&registry, "Bytes")
        .field("items", "list", FieldOptions::new().of("uint8").length_all())
        .build()
        .unwrap();

    let (inst, used) = desc.decode(&[1, 2, 3, 4]).unwrap();
    assert_eq!(used, 4);
    assert_eq!(
        inst.get("items").unwrap(),
        Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3), Value::UInt(4)])
    );
}

#[test]
fn test_packet_with_bitfield_header() {
    let registry = FieldTypeRegistry::standard();
    let flags = StructDescriptor::builder(&registry, "Flags")
        .field("urgent", "bit", FieldOptions::new())
        .field("reserved", "bit", FieldOptions::new().length(3))
        .field("level", "bit", FieldOptions::new().length(4))
        .build()
        .unwrap();
    let packet = StructDescriptor::builder(&registry, "Packet")
        .static_bytes(b"PK")
        .inline("flags", "msb_bitfield", FieldOptions::new().length(8), flags)
        .field("name", "string", FieldOptions::new().sizeof("uint8"))
        .field("payload", "list", FieldOptions::new().of("nint16").sizeof("uint8"))
        .build()
        .unwrap();

    let wire = b"PK\x85\x03bob\x02\x00\x01\x01\x00";
    let (inst, used) = packet.decode(wire).unwrap();
    assert_eq!(used, wire.len());

    let flags = inst.get("flags").unwrap();
    let flags = flags.as_struct().unwrap();
    assert_eq!(flags.get("urgent").unwrap(), Value::Bool(true));
    assert_eq!(
        flags.get("level").unwrap(),
        Value::List(vec![
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true)
        ])
    );
    assert_eq!(inst.get("name").unwrap(), Value::from("bob"));
    assert_eq!(
        inst.get("payload").unwrap(),
        Value::List(vec![Value::UInt(1), Value::UInt(256)])
    );

    assert_eq!(&packet.encode(&inst).unwrap()[..], &wire[..]);
}

#[tokio::test]
async fn test_struct_records_over_a_chain() {
    let registry = FieldTypeRegistry::standard();
    let entry = StructDescriptor::builder(&registry, "Entry")
        .field("id", "nint32", FieldOptions::new())
        .field("label", "nstring", FieldOptions::new())
        .build()
        .unwrap();

    let (mut w, mut r) = tokio::io::duplex(64);
    let mut tx = ProtocolChain::builder()
        .stage(StructProtocol::new(entry.clone()))
        .stage(SizedProtocol::new())
        .build()
        .unwrap();
    let mut rx = ProtocolChain::builder()
        .stage(StructProtocol::new(entry.clone()))
        .stage(SizedProtocol::new())
        .read_chunk_size(5)
        .build()
        .unwrap();

    let records: Vec<_> = ["first", "second"]
        .iter()
        .enumerate()
        .map(|(i, label)| {
            entry
                .instantiate()
                .with("id", i as u32)
                .unwrap()
                .with("label", *label)
                .unwrap()
        })
        .collect();

    for record in &records {
        tx.write_message(&mut w, Message::Record(record.clone())).await.unwrap();
    }
    for record in records {
        assert_eq!(rx.read_message(&mut r).await.unwrap(), Message::Record(record));
    }
}

// ---------------------------------------------------------------------------
// Split and merge across stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_splitter_yields_count_then_pieces() {
    let (mut w, mut r) = tokio::io::duplex(64);
    let mut chain = ProtocolChain::builder()
        .stage(Splitter)
        .stage(SizedProtocol::new())
        .build()
        .unwrap();

    chain.write_message(&mut w, Message::from("test")).await.unwrap();
    drop(w);

    assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::Object(json!(4)));
    for piece in ["t", "e", "s", "t"] {
        assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::from(piece));
    }
    assert!(matches!(
        chain.read_message(&mut r).await,
        Err(WirechainError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_merger_reassembles_split_message() {
    let (mut w, mut r) = tokio::io::duplex(64);
    let mut chain = ProtocolChain::builder()
        .stage(Merger::default())
        .stage(Splitter)
        .stage(SizedProtocol::new())
        .build()
        .unwrap();

    chain.write_message(&mut w, Message::from("test")).await.unwrap();
    assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::from("test"));
}

#[tokio::test]
async fn test_reassembly_waits_for_a_slow_writer() {
    let (mut w, mut r) = tokio::io::duplex(64);
    let build = || {
        ProtocolChain::builder()
            .stage(Merger::default())
            .stage(BufferedSplitter::default())
            .stage(SizedProtocol::new())
            .build()
            .unwrap()
    };
    let mut writer = build();
    let mut reader = build();

    writer.write_message(&mut w, Message::from("split")).await.unwrap();
    let slow = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.write_message(&mut w, Message::from("split")).await.unwrap();
        w
    });

    assert_eq!(
        reader.read_message(&mut r).await.unwrap(),
        Message::from("splitsplit")
    );
    assert_eq!(reader.buffered(), 0);
    slow.await.unwrap();
}

#[tokio::test]
async fn test_frame_split_across_reads() {
    let (mut w, mut r) = tokio::io::duplex(64);
    let mut chain = sized();
    let wire = chain.encode(Message::from("hello world")).unwrap();

    w.write_all(&wire[..6]).await.unwrap();
    let rest = wire.slice(6..);
    let slow = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        w.write_all(&rest).await.unwrap();
        w
    });

    assert_eq!(
        chain.read_message(&mut r).await.unwrap(),
        Message::from("hello world")
    );
    slow.await.unwrap();
}

#[tokio::test]
async fn test_timeout_leaves_buffer_intact() {
    let (mut w, mut r) = tokio::io::duplex(64);
    let mut chain = sized();
    let wire = chain.encode(Message::from("late")).unwrap();

    w.write_all(&wire[..10]).await.unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(20), chain.read_message(&mut r)).await;
    assert!(timed_out.is_err());
    assert_eq!(chain.buffered(), 10);

    w.write_all(&wire[10..]).await.unwrap();
    assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::from("late"));
}

// ---------------------------------------------------------------------------
// Object and text stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_shellwords_over_separator() {
    let (mut w, mut r) = tokio::io::duplex(256);
    let mut chain = ProtocolChain::builder()
        .stage(ShellwordsProtocol::new())
        .stage(SeparatorProtocol::new())
        .build()
        .unwrap();

    chain
        .write_message(&mut w, Message::Object(json!(["I am a", "multiword", "shell arg"])))
        .await
        .unwrap();
    chain
        .write_message(&mut w, Message::Object(json!(["I am a", "number: ", 12])))
        .await
        .unwrap();

    assert_eq!(
        chain.read_message(&mut r).await.unwrap(),
        Message::Object(json!(["I am a", "multiword", "shell arg"]))
    );
    assert_eq!(
        chain.read_message(&mut r).await.unwrap(),
        Message::Object(json!(["I am a", "number: ", "12"]))
    );
}

#[tokio::test]
async fn test_object_stages_roundtrip() {
    let a = json!([1, 2.4, false, true, null, "string"]);
    let b = json!({"1": "hi", "2": "test", "3": "bloh"});

    let chains = [
        ProtocolChain::builder()
            .stage(MsgPackProtocol::new())
            .build()
            .unwrap(),
        ProtocolChain::builder()
            .stage(MsgPackProtocol::new())
            .stage(SizedProtocol::new())
            .build()
            .unwrap(),
        ProtocolChain::builder()
            .stage(TextObjectProtocol::new())
            .build()
            .unwrap(),
    ];

    for mut chain in chains {
        let (mut w, mut r) = tokio::io::duplex(256);
        chain.write_message(&mut w, Message::Object(a.clone())).await.unwrap();
        chain.write_message(&mut w, Message::Object(b.clone())).await.unwrap();
        assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::Object(a.clone()));
        assert_eq!(chain.read_message(&mut r).await.unwrap(), Message::Object(b.clone()));
    }
}

#[tokio::test]
async fn test_compressed_objects() {
    let build = || {
        ProtocolChain::builder()
            .stage(MsgPackProtocol::new())
            .stage(ZlibProtocol::new())
            .stage(SizedProtocol::new())
            .build()
            .unwrap()
    };
    let (mut w, mut r) = tokio::io::duplex(4096);
    let mut tx = build();
    let mut rx = build();

    let values: Vec<Json> = (0..5)
        .map(|i| json!({"seq": i, "text": "compress me, compress me, compress me"}))
        .collect();
    for v in &values {
        tx.write_message(&mut w, Message::Object(v.clone())).await.unwrap();
    }
    for v in values {
        assert_eq!(rx.read_message(&mut r).await.unwrap(), Message::Object(v));
    }
}

#[test]
fn test_chain_reset_drops_stowed_fragments() {
    let build = || {
        ProtocolChain::builder()
            .stage(Merger::default())
            .stage(BufferedSplitter::default())
            .stage(SizedProtocol::new())
            .build()
            .unwrap()
    };
    let wire = build().encode(Message::from("ab")).unwrap();

    let mut kept = build();
    assert!(kept.decode(&wire).unwrap().is_empty());
    assert_eq!(kept.decode(&wire).unwrap(), vec![Message::from("abab")]);

    let mut reset = build();
    assert!(reset.decode(&wire).unwrap().is_empty());
    reset.reset();
    assert!(reset.decode(&wire).unwrap().is_empty());
    assert_eq!(reset.buffered(), 0);
}

#[test]
fn test_corrupt_frame_is_fatal() {
    let mut chain = ProtocolChain::builder()
        .stage(SizedProtocol::with_max_message_size(16))
        .build()
        .unwrap();
    let mut wire = 1000u64.to_le_bytes().to_vec();
    wire.extend_from_slice(b"x");
    assert!(chain.decode(&wire).unwrap_err().is_corrupt());
}
