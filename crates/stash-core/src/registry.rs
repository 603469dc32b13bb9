//! Registro de codecs.
//!
//! Estado explícito (nada global):
//! - lista **ordenada** de encoders, sondeados en orden de registro; el
//!   primero que acepta gana. Los adaptadores específicos deben registrarse
//!   antes que los genéricos.
//! - tabla `tag -> {versión -> decoder}`; un decoder se resuelve siempre por
//!   el par (tag, versión).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::codec::Codec;
use crate::context::Context;
use crate::errors::CodecError;
use crate::model::{Document, Envelope, Value};

/// Encoder de un tipo de dominio.
pub trait Encoder: Send + Sync {
    /// Nombre estable (logs y diagnóstico del orden de sondeo).
    fn name(&self) -> &str;

    /// `Ok(None)`: el valor no es de este encoder, probar el siguiente.
    /// `Ok(Some(doc))`: documento producido (normalmente un sobre).
    /// `Err(..)`: fallo real, se propaga sin probar más encoders.
    ///
    /// Los valores anidados se codifican a través de `codec`.
    fn try_encode(&self, value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError>;
}

/// Decoder de un par (tag, versión).
pub trait Decoder: Send + Sync {
    fn decode(&self, envelope: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError>;
}

/// Encoder a partir de una función o closure.
pub struct FnEncoder<F> {
    name: String,
    f: F,
}

impl<F> FnEncoder<F> where F: Fn(&Value, &Context, &Codec) -> Result<Option<Document>, CodecError> + Send + Sync
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Encoder for FnEncoder<F> where F: Fn(&Value, &Context, &Codec) -> Result<Option<Document>, CodecError> + Send + Sync
{
    fn name(&self) -> &str {
        &self.name
    }

    fn try_encode(&self, value: &Value, ctx: &Context, codec: &Codec) -> Result<Option<Document>, CodecError> {
        (self.f)(value, ctx, codec)
    }
}

/// Decoder a partir de una función o closure.
pub struct FnDecoder<F>(pub F);

impl<F> Decoder for FnDecoder<F> where F: Fn(Envelope, &Context, &Codec) -> Result<Value, CodecError> + Send + Sync
{
    fn decode(&self, envelope: Envelope, ctx: &Context, codec: &Codec) -> Result<Value, CodecError> {
        (self.0)(envelope, ctx, codec)
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    encoders: Vec<Arc<dyn Encoder>>,
    decoders: HashMap<String, BTreeMap<u32, Arc<dyn Decoder>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade un encoder al final del orden de sondeo.
    pub fn register_encoder<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
        where F: Fn(&Value, &Context, &Codec) -> Result<Option<Document>, CodecError> + Send + Sync + 'static
    {
        self.add_encoder(Arc::new(FnEncoder::new(name, f)))
    }

    pub fn add_encoder(&mut self, encoder: Arc<dyn Encoder>) -> &mut Self {
        self.encoders.push(encoder);
        self
    }

    /// Registra el decoder de `(tag, version)`. Un par ya registrado se
    /// reemplaza.
    pub fn register_decoder<F>(&mut self, tag: impl Into<String>, version: u32, f: F) -> &mut Self
        where F: Fn(Envelope, &Context, &Codec) -> Result<Value, CodecError> + Send + Sync + 'static
    {
        self.add_decoder(tag, version, Arc::new(FnDecoder(f)))
    }

    pub fn add_decoder(&mut self, tag: impl Into<String>, version: u32, decoder: Arc<dyn Decoder>) -> &mut Self {
        let tag = tag.into();
        let versions = self.decoders.entry(tag.clone()).or_default();
        if versions.insert(version, decoder).is_some() {
            warn!("decoder for `{tag}` version {version} registered twice; keeping the last one");
        }
        self
    }

    /// Agrega los encoders (al final) y decoders de `other`.
    pub fn extend(&mut self, other: Registry) -> &mut Self {
        self.encoders.extend(other.encoders);
        for (tag, versions) in other.decoders {
            for (version, decoder) in versions {
                self.add_decoder(tag.clone(), version, decoder);
            }
        }
        self
    }

    pub fn encoders(&self) -> impl Iterator<Item = &dyn Encoder> {
        self.encoders.iter().map(|e| e.as_ref())
    }

    /// Orden de sondeo efectivo.
    pub fn encoder_names(&self) -> Vec<&str> {
        self.encoders().map(|e| e.name()).collect()
    }

    /// Versiones registradas de `tag`, ascendentes.
    pub fn versions(&self, tag: &str) -> Vec<u32> {
        self.decoders.get(tag).map(|v| v.keys().copied().collect()).unwrap_or_default()
    }

    pub fn contains(&self, tag: &str, version: u32) -> bool {
        self.decoders.get(tag).is_some_and(|v| v.contains_key(&version))
    }

    /// Resuelve el decoder de un sobre; tag o versión desconocidos producen el
    /// mismo error de deserialización.
    pub fn decoder(&self, tag: &str, version: u32, ctx: &Context) -> Result<&dyn Decoder, CodecError> {
        let versions = self.decoders
                           .get(tag)
                           .ok_or_else(|| CodecError::deserialization(tag, Some(version), ctx.json_path(), "no decoder registered for this tag"))?;
        versions.get(&version).map(|d| d.as_ref()).ok_or_else(|| {
                                                      let known: Vec<String> = versions.keys().map(u32::to_string).collect();
                                                      CodecError::deserialization(tag,
                                                                                  Some(version),
                                                                                  ctx.json_path(),
                                                                                  format!("unknown version (registered: {})", known.join(", ")))
                                                  })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoders: BTreeMap<&str, Vec<u32>> = self.decoders
                                                     .iter()
                                                     .map(|(t, v)| (t.as_str(), v.keys().copied().collect()))
                                                     .collect();
        f.debug_struct("Registry")
         .field("encoders", &self.encoder_names())
         .field("decoders", &decoders)
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;

    fn ctx() -> Context {
        Context::builder().env(EnvConfig::default()).artifact_path(".").build().unwrap()
    }

    fn decode_one(_env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
        Ok(Value::Int(1))
    }

    fn decode_two(_env: Envelope, _ctx: &Context, _codec: &Codec) -> Result<Value, CodecError> {
        Ok(Value::Int(2))
    }

    #[test]
    fn decoders_are_selected_by_tag_and_version() {
        let mut reg = Registry::new();
        reg.register_decoder("x.y", 1, decode_one).register_decoder("x.y", 2, decode_two);
        assert_eq!(reg.versions("x.y"), vec![1, 2]);
        assert!(reg.contains("x.y", 2));
        assert!(!reg.contains("x.y", 3));

        let codec = Codec::new(reg.clone());
        let d = reg.decoder("x.y", 2, &ctx()).unwrap();
        assert_eq!(d.decode(Envelope::new("x.y", 2), &ctx(), &codec).unwrap(), Value::Int(2));
    }

    #[test]
    fn unknown_tag_and_version_fail_alike() {
        let mut reg = Registry::new();
        reg.register_decoder("x.y", 1, decode_one);
        let err = reg.decoder("x.y", 99, &ctx().with_child("k")).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("x.y") && msg.contains("99") && msg.contains("$.k"), "{msg}");
        assert!(matches!(reg.decoder("nope", 1, &ctx()).err().unwrap(), CodecError::Deserialization { .. }));
    }

    #[test]
    fn encoders_keep_registration_order() {
        let mut reg = Registry::new();
        reg.register_encoder("specific", |_, _, _| Ok(None))
           .register_encoder("generic", |_, _, _| Ok(None));
        let mut other = Registry::new();
        other.register_encoder("late", |_, _, _| Ok(None));
        reg.extend(other);
        assert_eq!(reg.encoder_names(), vec!["specific", "generic", "late"]);
    }

    #[test]
    fn debug_lists_names_and_versions() {
        let mut reg = Registry::new();
        reg.register_decoder("x.y", 3, decode_one);
        let dbg = format!("{reg:?}");
        assert!(dbg.contains("x.y") && dbg.contains('3'));
    }
}
