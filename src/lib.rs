//! # wirechain
//!
//! Declarative binary structures and layered protocol chains for RPC streams.
//!
//! ## Architecture
//!
//! - **Binary structs** ([`binary`]): a [`FieldTypeRegistry`] maps type tags
//!   to field codecs; a [`StructDescriptor`] lists fields in wire order and
//!   turns bytes into [`StructInstance`]s and back.
//! - **Protocol chains** ([`chain`], [`protocol`]): framing and encoding
//!   stages stacked innermost first, decoding incrementally from an async
//!   stream with a persistent buffer.
//! - **RPC boundary** ([`rpc`], [`endpoint`]): call/reply records and an
//!   [`Endpoint`] binding one chain to one stream.
//!
//! ## Example
//!
//! ```
//! use wirechain::binary::{FieldOptions, FieldTypeRegistry};
//! use wirechain::protocol::{Message, SizedProtocol, StructProtocol};
//! use wirechain::{ProtocolChain, StructDescriptor};
//!
//! let registry = FieldTypeRegistry::standard();
//! let point = StructDescriptor::builder(&registry, "Point")
//!     .field("x", "int16", FieldOptions::new())
//!     .field("y", "int16", FieldOptions::new())
//!     .build()
//!     .unwrap();
//!
//! let mut chain = ProtocolChain::builder()
//!     .stage(StructProtocol::new(point.clone()))
//!     .stage(SizedProtocol::new())
//!     .build()
//!     .unwrap();
//!
//! let record = point.instantiate().with("x", 3i16).unwrap().with("y", -4i16).unwrap();
//! let wire = chain.encode(Message::Record(record.clone())).unwrap();
//! assert_eq!(chain.decode(&wire).unwrap(), vec![Message::Record(record)]);
//! ```

pub mod binary;
pub mod chain;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod rpc;

pub use binary::{FieldTypeRegistry, StructDescriptor, StructInstance, Value};
pub use chain::{ChainConfig, ProtocolChain, ProtocolChainBuilder};
pub use endpoint::Endpoint;
pub use error::{Result, WirechainError};
pub use protocol::{Extract, Message, Protocol};
