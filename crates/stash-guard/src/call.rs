//! Llamada protegida.
//!
//! Por defecto el resultado se guarda en una ubicación fija. Con
//! `hash_args(true)` cada tupla de argumentos tiene su propio slot
//! `<dir>/<stem>/<digest><ext>`, donde el digest es el blake3 del JSON
//! canónico de `{ engine_version, args }` con los argumentos ya codificados.
//! Los argumentos se codifican en modo huella: ningún artifact se escribe y
//! los que lo serían se identifican por el hash de su contenido.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use stash_core::constants::ENGINE_VERSION;
use stash_core::hashing::hash_value;
use stash_core::{Codec, Context, Document, Value};

use crate::errors::GuardError;
use crate::guard::{is_persistable, sub_location, CorruptRecordPolicy, Guard};

/// Insumos del digest de argumentos (modelo previo a canonicalizar).
#[derive(Serialize)]
struct CallFingerprintInput<'a> {
    engine_version: &'a str,
    args: &'a Document,
}

#[derive(Debug, Clone)]
pub struct GuardedCall {
    path: PathBuf,
    name: Option<String>,
    guard: Guard,
    hash_args: bool,
}

impl GuardedCall {
    pub fn new(path: impl Into<PathBuf>, codec: Codec) -> Self {
        Self { path: path.into(),
               name: None,
               guard: Guard::new(codec),
               hash_args: false }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn policy(mut self, policy: CorruptRecordPolicy) -> Self {
        self.guard = self.guard.with_policy(policy);
        self
    }

    pub fn context(mut self, ctx: Context) -> Self {
        self.guard = self.guard.with_context(ctx);
        self
    }

    pub fn hash_args(mut self, enabled: bool) -> Self {
        self.hash_args = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest de `args`. Sólo depende del contenido: los payloads binarios
    /// quedan inline y los documentos embebidos se identifican por su hash.
    pub fn fingerprint(&self, args: &Value) -> Result<String, GuardError> {
        let ctx = self.guard
                      .context_for(&self.path)
                      .and_then(|c| Context::builder().env(Default::default())
                                                      .artifact_path(c.artifact_path())
                                                      .min_artifact_size(usize::MAX)
                                                      .nodecode_types(c.nodecode_types().iter().cloned())
                                                      .fingerprint_only(true)
                                                      .build())
                      .map_err(GuardError::Fingerprint)?;
        let encoded = self.guard.codec().encode(args, &ctx).map_err(GuardError::Fingerprint)?;
        let input = CallFingerprintInput { engine_version: ENGINE_VERSION,
                                           args: &encoded };
        let doc = serde_json::to_value(&input).map_err(|e| GuardError::Fingerprint(e.into()))?;
        Ok(hash_value(&doc))
    }

    /// Ubicación del registro para `args`.
    pub fn location_for(&self, args: &Value) -> Result<PathBuf, GuardError> {
        if self.hash_args {
            sub_location(&self.path, &self.fingerprint(args)?)
        } else {
            Ok(self.path.clone())
        }
    }

    pub fn call<F, E>(&self, args: &Value, f: F) -> Result<Option<Value>, E>
        where F: FnOnce(&Value) -> Result<Option<Value>, E>,
              E: From<GuardError>
    {
        let path = self.location_for(args)?;
        if let Some(value) = self.guard.load(&path)? {
            if let Some(name) = &self.name {
                debug!("skipped guarded call '{name}' ({})", path.display());
            }
            return Ok(Some(value));
        }
        let result = f(args)?;
        if let Some(value) = result.as_ref().filter(|v| is_persistable(v)) {
            self.guard.persist(&path, value)?;
            if let Some(name) = &self.name {
                debug!("saved guarded call '{name}' results to '{}'", path.display());
            }
        }
        Ok(result)
    }
}
