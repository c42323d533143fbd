//! Built-in field codecs.

mod bits;
mod fixed;
mod list;
mod pack;
mod strings;
mod structure;
mod transfer;

pub use bits::{BitCodec, BitfieldCodec};
pub use fixed::FixedCodec;
pub use list::ListCodec;
pub use pack::{ByteOrder, PackCodec, Scalar};
pub use strings::{BytesCodec, BytesKind};
pub use structure::StructCodec;
