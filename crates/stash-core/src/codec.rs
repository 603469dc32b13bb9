//! Dispatcher de (de)serialización.
//!
//! `Codec` recorre recursivamente el valor (encode) o el documento (decode):
//! - encode: sondea los encoders del registro en orden; si ninguno acepta,
//!   aplica la regla JSON plana (listas y mapas se recorren campo a campo con
//!   un contexto hijo). Un `Object` que nadie acepta es `Unsupported`.
//! - decode: arrays y objetos que no son sobres se recorren campo a campo;
//!   los sobres pasan por el filtro nodecode y luego por el decoder de su par
//!   (tag, versión). La señal nodecode se convierte aquí en `Value::Absent` y
//!   nunca sale del dispatcher.
//!
//! Los adaptadores reciben el `Codec` como argumento para recurrir sobre sus
//! valores anidados.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde_json::{Map, Number};

use crate::artifact::write_atomic;
use crate::context::Context;
use crate::errors::CodecError;
use crate::model::{Document, Envelope, Value};
use crate::registry::Registry;

#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<Registry>,
}

impl Codec {
    pub fn new(registry: Registry) -> Self {
        Self { registry: Arc::new(registry) }
    }

    /// Codec sin adaptadores: sólo la regla JSON plana.
    pub fn plain() -> Self {
        Self::new(Registry::new())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn encode(&self, value: &Value, ctx: &Context) -> Result<Document, CodecError> {
        for encoder in self.registry.encoders() {
            if let Some(doc) = encoder.try_encode(value, ctx, self)? {
                return Ok(doc);
            }
        }
        self.encode_plain(value, ctx)
    }

    fn encode_plain(&self, value: &Value, ctx: &Context) -> Result<Document, CodecError> {
        Ok(match value {
            Value::Null | Value::Absent => Document::Null,
            Value::Bool(b) => Document::Bool(*b),
            Value::Int(i) => Document::from(*i),
            Value::UInt(u) => Document::from(*u),
            Value::Float(f) => {
                Document::Number(Number::from_f64(*f).ok_or_else(|| CodecError::unsupported("f64 (non-finite)", ctx.json_path()))?)
            }
            Value::Str(s) => Document::String(s.clone()),
            Value::List(items) => Document::Array(self.encode_list(items, ctx)?),
            Value::Map(map) => Document::Object(self.encode_map(map, ctx)?),
            Value::Object(obj) => return Err(CodecError::unsupported(obj.type_name(), ctx.json_path())),
        })
    }

    /// Codifica cada elemento con el contexto hijo `índice`.
    pub fn encode_list(&self, items: &[Value], ctx: &Context) -> Result<Vec<Document>, CodecError> {
        items.iter()
             .enumerate()
             .map(|(i, v)| self.encode(v, &ctx.with_child(i)))
             .collect()
    }

    /// Codifica cada entrada con el contexto hijo `clave`.
    pub fn encode_map(&self, map: &BTreeMap<String, Value>, ctx: &Context) -> Result<Map<String, Document>, CodecError> {
        map.iter()
           .map(|(k, v)| Ok((k.clone(), self.encode(v, &ctx.with_child(k))?)))
           .collect()
    }

    pub fn decode(&self, doc: &Document, ctx: &Context) -> Result<Value, CodecError> {
        Ok(match doc {
            Document::Null => Value::Null,
            Document::Bool(b) => Value::Bool(*b),
            Document::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int(i),
                (None, Some(u)) => Value::UInt(u),
                (None, None) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Document::String(s) => Value::Str(s.clone()),
            Document::Array(items) => Value::List(self.decode_list(items, ctx)?),
            Document::Object(map) => match Envelope::detect(doc, ctx.json_path()) {
                Some(envelope) => return self.decode_envelope(envelope?, ctx),
                None => Value::Map(self.decode_map(map, ctx)?),
            },
        })
    }

    pub fn decode_list(&self, items: &[Document], ctx: &Context) -> Result<Vec<Value>, CodecError> {
        items.iter()
             .enumerate()
             .map(|(i, d)| self.decode(d, &ctx.with_child(i)))
             .collect()
    }

    pub fn decode_map(&self, map: &Map<String, Document>, ctx: &Context) -> Result<BTreeMap<String, Value>, CodecError> {
        map.iter()
           .map(|(k, d)| Ok((k.clone(), self.decode(d, &ctx.with_child(k))?)))
           .collect()
    }

    /// Decodifica un sobre ya reconocido.
    pub fn decode_envelope(&self, envelope: Envelope, ctx: &Context) -> Result<Value, CodecError> {
        if ctx.is_nodecode(&envelope.tag) {
            debug!("skipped decoding of `{}` at {}", envelope.tag, ctx.json_path());
            return Ok(Value::Absent);
        }
        let decoder = self.registry.decoder(&envelope.tag, envelope.version, ctx)?;
        match decoder.decode(envelope, ctx, self) {
            Err(CodecError::Nodecode { tag }) => {
                debug!("skipped decoding of `{tag}` at {}", ctx.json_path());
                Ok(Value::Absent)
            }
            other => other,
        }
    }

    pub fn to_json(&self, value: &Value, ctx: &Context) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.encode(value, ctx)?)?)
    }

    pub fn to_json_pretty(&self, value: &Value, ctx: &Context) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(&self.encode(value, ctx)?)?)
    }

    pub fn from_json(&self, text: &str, ctx: &Context) -> Result<Value, CodecError> {
        let doc: Document = serde_json::from_str(text)?;
        self.decode(&doc, ctx)
    }

    /// Serializa y guarda `value` en `path`. Sin contexto explícito, los
    /// artifacts van al directorio padre de `path`.
    pub fn save_json(&self, value: &Value, path: impl AsRef<Path>, ctx: Option<&Context>) -> Result<(), CodecError> {
        let path = path.as_ref();
        let ctx = match ctx {
            Some(c) => c.clone(),
            None => Context::for_file(path)?,
        };
        let text = self.to_json(value, &ctx)?;
        write_atomic(path, text.as_bytes())?;
        debug!("saved document {}", path.display());
        Ok(())
    }

    /// Carga y deserializa el documento en `path`. Sin contexto explícito, los
    /// artifacts se buscan en el directorio padre de `path`.
    pub fn load_json(&self, path: impl AsRef<Path>, ctx: Option<&Context>) -> Result<Value, CodecError> {
        let path = path.as_ref();
        let ctx = match ctx {
            Some(c) => c.clone(),
            None => Context::for_file(path)?,
        };
        let text = std::fs::read_to_string(path)?;
        self.from_json(&text, &ctx)
    }
}

impl From<Registry> for Codec {
    fn from(registry: Registry) -> Self {
        Codec::new(registry)
    }
}
