//! Documentos JSON embebidos.
//!
//! Un `EmbeddedDict` o `EmbeddedList` se escribe siempre como su propio
//! artifact `.json` (sin aplicar el umbral inline) y el documento principal
//! sólo guarda la referencia:
//!
//! ```json
//! { "__type__": "embedded.dict", "__version__": 1, "id": "<uuid>" }
//! ```
//!
//! El contenido se (de)serializa con el mismo `Codec` inyectado, por lo que
//! puede contener cualquier valor que el registro sepa manejar.

use std::collections::BTreeMap;

use stash_core::constants::{ID_KEY, JSON_EXTENSION};
use stash_core::{impl_object, Codec, CodecError, Context, Document, Envelope, Registry, Value};

pub const DICT_TAG: &str = "embedded.dict";
pub const LIST_TAG: &str = "embedded.list";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedDict(pub BTreeMap<String, Value>);
impl_object!(EmbeddedDict);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedList(pub Vec<Value>);
impl_object!(EmbeddedList);

pub fn register(reg: &mut Registry) {
    reg.register_encoder("embedded", encode)
       .register_decoder(DICT_TAG, 1, decode_dict_v1)
       .register_decoder(LIST_TAG, 1, decode_list_v1);
}

fn encode(value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError> {
    let (tag, inner) = if let Some(d) = value.downcast_ref::<EmbeddedDict>() {
        (DICT_TAG, Value::Map(d.0.clone()))
    } else if let Some(l) = value.downcast_ref::<EmbeddedList>() {
        (LIST_TAG, Value::List(l.0.clone()))
    } else {
        return Ok(None);
    };
    let text = codec.to_json(&inner, ctx)?;
    let reference = ctx.artifacts().externalize_with_extension(text.as_bytes(), JSON_EXTENSION)?;
    Ok(Some(Envelope::new(tag, 1).with_field(ID_KEY, reference.id).into_document()))
}

fn load_embedded(env: &Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    let reference = env.artifact_field()?;
    let bytes = ctx.artifacts().resolve_with_extension(&reference, JSON_EXTENSION)?;
    let text = String::from_utf8(bytes).map_err(|e| env.malformed(format!("embedded document is not UTF-8: {e}")))?;
    codec.from_json(&text, ctx)
}

fn decode_dict_v1(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    match load_embedded(&env, ctx, codec)? {
        Value::Map(m) => Ok(Value::object(EmbeddedDict(m))),
        other => Err(env.malformed(format!("embedded document must be an object, got {}", other.type_name()))),
    }
}

fn decode_list_v1(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    match load_embedded(&env, ctx, codec)? {
        Value::List(l) => Ok(Value::object(EmbeddedList(l))),
        other => Err(env.malformed(format!("embedded document must be an array, got {}", other.type_name()))),
    }
}
