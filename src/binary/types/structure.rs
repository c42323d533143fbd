use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::binary::codec::{Context, FieldCodec};
use crate::binary::options::Options;
use crate::binary::{StructDescriptor, Value};
use crate::error::{Result, WirechainError};

/// Embeds a nested struct as a field.
#[derive(Debug, Clone)]
pub struct StructCodec(pub Arc<StructDescriptor>);

impl FieldCodec for StructCodec {
    fn binary_size(&self, _options: &Options) -> Option<usize> {
        self.0.binary_size()
    }

    fn initial_value(&self, options: &Options) -> Option<Value> {
        options
            .default
            .clone()
            .or_else(|| Some(Value::Struct(self.0.instantiate())))
    }

    fn decode(&self, input: &[u8], _options: &Options, _ctx: &Context<'_>) -> Result<(Value, usize)> {
        let (instance, used) = self.0.decode(input)?;
        Ok((Value::Struct(instance), used))
    }

    fn encode(
        &self,
        value: &Value,
        _options: &Options,
        _ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        let instance = value.as_struct().ok_or_else(|| {
            WirechainError::corrupt(format!(
                "expected {} struct, got {}",
                self.0.name(),
                value.type_name()
            ))
        })?;
        out.put_slice(&self.0.encode(instance)?);
        Ok(())
    }
}
