//! Mapas con claves arbitrarias (no sólo strings).
//!
//! ```json
//! { "__type__": "dict", "__version__": 2, "items": [ { "key": ..., "val": ... } ] }
//! ```

use serde_json::Map;
use stash_core::{impl_object, Codec, CodecError, Context, Document, Envelope, Registry, Value};

pub const TAG: &str = "dict";
pub const VERSION: u32 = 2;

/// Mapa de pares `(clave, valor)` con claves `Value`; conserva el orden de
/// inserción y la unicidad por igualdad.
#[derive(Debug, Clone, Default)]
pub struct KeyedMap(Vec<(Value, Value)>);
impl_object!(KeyedMap);

impl KeyedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta o reemplaza; devuelve el valor previo.
    pub fn insert(&mut self, key: impl Into<Value>, val: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let val = val.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, val)),
            None => {
                self.0.push((key, val));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for KeyedMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for KeyedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = KeyedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

pub fn register(reg: &mut Registry) {
    reg.register_encoder(TAG, encode).register_decoder(TAG, VERSION, decode_v2);
}

fn encode(value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError> {
    let Some(map) = value.downcast_ref::<KeyedMap>() else {
        return Ok(None);
    };
    let items_ctx = ctx.with_child("items");
    let items = map.0
                   .iter()
                   .enumerate()
                   .map(|(i, (k, v))| {
                       let item_ctx = items_ctx.with_child(i);
                       let mut item = Map::new();
                       item.insert("key".to_string(), codec.encode(k, &item_ctx.with_child("key"))?);
                       item.insert("val".to_string(), codec.encode(v, &item_ctx.with_child("val"))?);
                       Ok(Document::Object(item))
                   })
                   .collect::<Result<Vec<_>, CodecError>>()?;
    Ok(Some(Envelope::new(TAG, VERSION).with_field("items", items).into_document()))
}

fn decode_v2(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    let items = env.field("items")?
                   .as_array()
                   .ok_or_else(|| env.malformed("`items` must be an array"))?;
    let items_ctx = ctx.with_child("items");
    let mut map = KeyedMap::new();
    for (i, item) in items.iter().enumerate() {
        let item_ctx = items_ctx.with_child(i);
        let (Some(key), Some(val)) = (item.get("key"), item.get("val")) else {
            return Err(env.malformed(format!("item {i} must carry `key` and `val`")));
        };
        map.insert(codec.decode(key, &item_ctx.with_child("key"))?,
                   codec.decode(val, &item_ctx.with_child("val"))?);
    }
    Ok(Value::object(map))
}
