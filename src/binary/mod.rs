//! Declarative binary structures.
//!
//! - [`FieldTypeRegistry`]: type tags to [`FieldCodec`]s
//! - [`StructDescriptor`]: an ordered field layout built by [`StructBuilder`]
//! - [`StructInstance`]: decoded values keyed by field name

pub mod codec;
mod descriptor;
mod instance;
pub mod options;
mod registry;
pub mod types;
mod value;

pub use codec::{Context, FieldCodec};
pub use descriptor::{ComputeFn, Field, StructBuilder, StructDescriptor, VirtualField};
pub use instance::StructInstance;
pub use options::{FieldOptions, FieldType, Length, Limit, Options, TypeSpec};
pub use registry::FieldTypeRegistry;
pub use value::Value;
