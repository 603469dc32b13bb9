//! Secuencias de bytes.
//!
//! - v3 (actual): payload inline (`"data"`, base64) si cabe en el umbral del
//!   contexto, si no artifact externo (`"id"`).
//! - v2: siempre inline en base64. Sólo se decodifica (documentos antiguos).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stash_core::constants::DATA_KEY;
use stash_core::{impl_object, Codec, CodecError, Context, Document, Envelope, Payload, Registry, Value};

pub const TAG: &str = "bytes";
pub const VERSION: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);
impl_object!(Bytes);

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Bytes(v.to_vec())
    }
}

pub fn register(reg: &mut Registry) {
    reg.register_encoder(TAG, encode)
       .register_decoder(TAG, 2, decode_v2)
       .register_decoder(TAG, 3, decode_v3);
}

fn encode(value: &Value, ctx: &Context, _codec: &Codec) -> Result<Option<Document>, CodecError> {
    let Some(bytes) = value.downcast_ref::<Bytes>() else {
        return Ok(None);
    };
    let payload = ctx.artifacts().store(bytes.0.clone())?;
    Ok(Some(payload.write_into(Envelope::new(TAG, VERSION)).into_document()))
}

fn decode_v2(env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
    let data = BASE64.decode(env.str_field(DATA_KEY)?)
                     .map_err(|e| env.malformed(format!("invalid base64 in `data`: {e}")))?;
    Ok(Value::object(Bytes(data)))
}

fn decode_v3(env: Envelope, ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
    let data = Payload::from_envelope(&env)?.load(ctx)?;
    Ok(Value::object(Bytes(data)))
}
