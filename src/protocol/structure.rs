use std::sync::Arc;

use super::{Extract, Message, Protocol};
use crate::binary::StructDescriptor;
use crate::error::Result;

/// Decodes byte messages into records of one struct layout.
///
/// The layout must be self-delimiting (static size, length prefixes or
/// sibling lengths) when this stage sits directly on the stream.
#[derive(Debug, Clone)]
pub struct StructProtocol {
    descriptor: Arc<StructDescriptor>,
}

impl StructProtocol {
    pub fn new(descriptor: Arc<StructDescriptor>) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }
}

impl Protocol for StructProtocol {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let record = message.into_record(self.descriptor.name())?;
        Ok(vec![Message::Bytes(self.descriptor.encode(&record)?)])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        match self.descriptor.decode(input) {
            Ok((record, used)) => Ok(Extract::one(used, record)),
            Err(e) if e.is_incomplete() => {
                tracing::trace!("{} incomplete: {}", self.descriptor.name(), e);
                Ok(Extract::Incomplete)
            }
            Err(e) => Err(e),
        }
    }
}
