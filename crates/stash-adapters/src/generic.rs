//! Encoder genérico: cualquier `Object` que exponga `attributes()` se
//! serializa como mapa plano de esos atributos. No lleva sobre ni decoder, así
//! que al leer se obtiene un `Value::Map`.
//!
//! Debe registrarse el último: sólo actúa si ningún adaptador específico
//! aceptó el valor.

use std::collections::BTreeMap;

use stash_core::{Codec, CodecError, Context, Document, Registry, Value};

pub const NAME: &str = "generic";

pub fn register(reg: &mut Registry) {
    reg.register_encoder(NAME, encode);
}

fn encode(value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError> {
    let Some(attributes) = value.as_object().and_then(|o| o.attributes()) else {
        return Ok(None);
    };
    let map: BTreeMap<String, Value> = attributes.into_iter().collect();
    Ok(Some(Document::Object(codec.encode_map(&map, ctx)?)))
}
