//! Colecciones estándar: deque acotada, conjunto y tupla con nombre.
//!
//! Formas en disco (todas v2):
//! - `collections.deque`: `{ "data": [...], "maxlen": <int|null> }`
//! - `collections.set`: `{ "data": [...] }`
//! - `collections.namedtuple`: `{ "class": <str>, "data": {...} }`
//!
//! Los elementos se codifican a través del `Codec`, de modo que pueden ser
//! valores de dominio arbitrarios.

use std::collections::{BTreeMap, VecDeque};

use stash_core::constants::DATA_KEY;
use stash_core::{impl_object, Codec, CodecError, Context, Document, Envelope, Registry, Value};

pub const DEQUE_TAG: &str = "collections.deque";
pub const SET_TAG: &str = "collections.set";
pub const NAMEDTUPLE_TAG: &str = "collections.namedtuple";
pub const VERSION: u32 = 2;

/// Cola doble con longitud máxima opcional; al superarla se descartan
/// elementos del extremo opuesto.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deque {
    items: VecDeque<Value>,
    maxlen: Option<usize>,
}
impl_object!(Deque);

impl Deque {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_maxlen(maxlen: usize) -> Self {
        Self { items: VecDeque::new(),
               maxlen: Some(maxlen) }
    }

    pub fn push_back(&mut self, value: impl Into<Value>) {
        if self.maxlen == Some(0) {
            return;
        }
        if self.maxlen.is_some_and(|m| self.items.len() >= m) {
            self.items.pop_front();
        }
        self.items.push_back(value.into());
    }

    pub fn push_front(&mut self, value: impl Into<Value>) {
        if self.maxlen == Some(0) {
            return;
        }
        if self.maxlen.is_some_and(|m| self.items.len() >= m) {
            self.items.pop_back();
        }
        self.items.push_front(value.into());
    }

    pub fn maxlen(&self) -> Option<usize> {
        self.maxlen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

/// Conjunto de valores. `Value` no es `Hash`, así que la unicidad se mantiene
/// por igualdad al insertar; la comparación ignora el orden.
#[derive(Debug, Clone, Default)]
pub struct ValueSet(Vec<Value>);
impl_object!(ValueSet);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta `value`; devuelve `false` si ya estaba.
    pub fn insert(&mut self, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|v| other.contains(v))
    }
}

impl<V: Into<Value>> FromIterator<V> for ValueSet {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

/// Tupla con nombre: nombre de clase más campos nombrados.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTuple {
    pub class: String,
    pub fields: BTreeMap<String, Value>,
}
impl_object!(NamedTuple);

impl NamedTuple {
    pub fn new<K, V, I>(class: impl Into<String>, fields: I) -> Self
        where K: Into<String>,
              V: Into<Value>,
              I: IntoIterator<Item = (K, V)>
    {
        Self { class: class.into(),
               fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

pub fn register(reg: &mut Registry) {
    reg.register_encoder("collections", encode)
       .register_decoder(DEQUE_TAG, VERSION, decode_deque_v2)
       .register_decoder(SET_TAG, VERSION, decode_set_v2)
       .register_decoder(NAMEDTUPLE_TAG, VERSION, decode_namedtuple_v2);
}

fn encode(value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError> {
    let data_ctx = ctx.with_child(DATA_KEY);
    let envelope = if let Some(deq) = value.downcast_ref::<Deque>() {
        let items: Vec<Value> = deq.items.iter().cloned().collect();
        Envelope::new(DEQUE_TAG, VERSION).with_field(DATA_KEY, codec.encode_list(&items, &data_ctx)?)
                                         .with_field("maxlen", deq.maxlen.map(|m| m as u64))
    } else if let Some(set) = value.downcast_ref::<ValueSet>() {
        Envelope::new(SET_TAG, VERSION).with_field(DATA_KEY, codec.encode_list(&set.0, &data_ctx)?)
    } else if let Some(tup) = value.downcast_ref::<NamedTuple>() {
        Envelope::new(NAMEDTUPLE_TAG, VERSION).with_field("class", tup.class.clone())
                                              .with_field(DATA_KEY, codec.encode_map(&tup.fields, &data_ctx)?)
    } else {
        return Ok(None);
    };
    Ok(Some(envelope.into_document()))
}

fn data_array<'e>(env: &'e Envelope) -> Result<&'e [Document], CodecError> {
    env.field(DATA_KEY)?
       .as_array()
       .map(Vec::as_slice)
       .ok_or_else(|| env.malformed("`data` must be an array"))
}

fn decode_deque_v2(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    let maxlen = match env.field("maxlen")? {
        Document::Null => None,
        m => Some(m.as_u64().ok_or_else(|| env.malformed("`maxlen` must be a non-negative integer or null"))? as usize),
    };
    let items = codec.decode_list(data_array(&env)?, &ctx.with_child(DATA_KEY))?;
    let mut deq = Deque { items: VecDeque::new(),
                          maxlen };
    for item in items {
        deq.push_back(item);
    }
    Ok(Value::object(deq))
}

fn decode_set_v2(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    let items = codec.decode_list(data_array(&env)?, &ctx.with_child(DATA_KEY))?;
    Ok(Value::object(items.into_iter().collect::<ValueSet>()))
}

fn decode_namedtuple_v2(env: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
    let class = env.str_field("class")?.to_string();
    let data = env.field(DATA_KEY)?
                  .as_object()
                  .ok_or_else(|| env.malformed("`data` must be an object"))?;
    let fields = codec.decode_map(data, &ctx.with_child(DATA_KEY))?;
    Ok(Value::object(NamedTuple { class, fields }))
}
