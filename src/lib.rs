//! StashFlow Rust Library
//!
//! Fachada sobre los crates del workspace:
//! - `stash-core`: modelo de valores, sobres, contexto, artifacts y `Codec`.
//! - `stash-adapters`: adaptadores de referencia y `default_registry()`.
//! - `stash-guard`: bloques, bucles y llamadas protegidas.
//!
//! Las funciones de este módulo usan el codec por defecto; quien necesite otro
//! registro construye su propio `Codec`.

pub mod errors;

use std::path::{Path, PathBuf};

pub use errors::StashError;
pub use stash_adapters as adapters;
pub use stash_adapters::default_registry;
pub use stash_core::{impl_object, ArtifactRef, Codec, CodecError, Context, ContextBuilder, Document, EnvConfig, Envelope, EnvelopeSpec, Object, Registry, Value};
pub use stash_guard::{CorruptRecordPolicy, GuardError, GuardedBlock, GuardedCall, GuardedLoop, LoopStep};

/// Codec con todos los adaptadores de referencia.
pub fn default_codec() -> Codec {
    stash_adapters::default_codec()
}

fn context_or_default(ctx: Option<&Context>) -> Result<Context, StashError> {
    match ctx {
        Some(c) => Ok(c.clone()),
        None => Ok(Context::new()?),
    }
}

pub fn encode(value: &Value, ctx: Option<&Context>) -> Result<Document, StashError> {
    Ok(default_codec().encode(value, &context_or_default(ctx)?)?)
}

pub fn decode(doc: &Document, ctx: Option<&Context>) -> Result<Value, StashError> {
    Ok(default_codec().decode(doc, &context_or_default(ctx)?)?)
}

pub fn to_json(value: &Value, ctx: Option<&Context>) -> Result<String, StashError> {
    Ok(default_codec().to_json(value, &context_or_default(ctx)?)?)
}

pub fn from_json(text: &str, ctx: Option<&Context>) -> Result<Value, StashError> {
    Ok(default_codec().from_json(text, &context_or_default(ctx)?)?)
}

/// Guarda `value` en `path`; sin contexto, los artifacts van junto al archivo.
pub fn save_json(value: &Value, path: impl AsRef<Path>, ctx: Option<&Context>) -> Result<(), StashError> {
    Ok(default_codec().save_json(value, path, ctx)?)
}

pub fn load_json(path: impl AsRef<Path>, ctx: Option<&Context>) -> Result<Value, StashError> {
    Ok(default_codec().load_json(path, ctx)?)
}

pub fn guarded_block(path: impl Into<PathBuf>) -> GuardedBlock {
    GuardedBlock::new(path, default_codec())
}

pub fn guarded_loop<K, I>(path: impl Into<PathBuf>, keys: I) -> GuardedLoop<K>
    where K: std::fmt::Display,
          I: IntoIterator<Item = K>
{
    GuardedLoop::new(path, keys, default_codec())
}

pub fn guarded_call(path: impl Into<PathBuf>) -> GuardedCall {
    GuardedCall::new(path, default_codec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_round_trip() {
        let ctx = Context::builder().env(EnvConfig::default()).artifact_path(".").build().unwrap();
        let value = Value::map([("a", Value::from(vec![1, 2])), ("b", Value::from(true))]);
        let text = to_json(&value, Some(&ctx)).unwrap();
        assert_eq!(text, r#"{"a":[1,2],"b":true}"#);
        assert_eq!(from_json(&text, Some(&ctx)).unwrap(), value);
    }

    #[test]
    fn unsupported_values_surface_through_the_umbrella_error() {
        #[derive(Debug, Clone, PartialEq)]
        struct Nope;
        impl_object!(Nope);

        let ctx = Context::builder().env(EnvConfig::default()).artifact_path(".").build().unwrap();
        let err = encode(&Value::object(Nope), Some(&ctx)).unwrap_err();
        assert!(err.is_unsupported());
    }
}
