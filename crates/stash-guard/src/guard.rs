//! Primitiva compartida por bloques, bucles y llamadas protegidas.
//!
//! Un registro de guarda es un documento JSON persistido en una ubicación de
//! salida. Si existe, el trabajo se omite y se devuelve el valor decodificado;
//! si no, el trabajo se ejecuta y su resultado (si no es nulo ni ausente) se
//! persiste. El sistema nunca borra registros.

use std::path::{Path, PathBuf};

use log::warn;
use stash_core::{is_plain_file_name, Codec, CodecError, Context, Value};

use crate::errors::GuardError;

/// Qué hacer con un registro existente que no se puede leer o decodificar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptRecordPolicy {
    /// Propagar como `GuardError::Load`.
    #[default]
    Fail,
    /// Registrar un aviso y recomputar; el resultado nuevo reemplaza el
    /// registro de forma atómica.
    Recompute,
}

#[derive(Debug, Clone)]
pub struct Guard {
    codec: Codec,
    policy: CorruptRecordPolicy,
    base: Option<Context>,
}

impl Guard {
    pub fn new(codec: Codec) -> Self {
        Self { codec,
               policy: CorruptRecordPolicy::default(),
               base: None }
    }

    pub fn with_policy(mut self, policy: CorruptRecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configuración base (nodecode, umbral, opciones) para leer y escribir
    /// registros. El directorio de artifacts siempre se re-basa al del
    /// registro.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.base = Some(ctx);
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn policy(&self) -> CorruptRecordPolicy {
        self.policy
    }

    /// Contexto para el registro en `path`: artifacts junto al registro.
    pub fn context_for(&self, path: &Path) -> Result<Context, CodecError> {
        match &self.base {
            Some(base) => Ok(base.rebased_on_file(path)),
            None => Context::builder().file_path(path).artifact_path(parent_dir(path)).build(),
        }
    }

    /// `Ok(None)` si no hay registro (o si está corrupto y la política es
    /// `Recompute`).
    pub fn load(&self, path: &Path) -> Result<Option<Value>, GuardError> {
        if !path.is_file() {
            return Ok(None);
        }
        let loaded = self.context_for(path)
                         .and_then(|ctx| self.codec.load_json(path, Some(&ctx)));
        match (loaded, self.policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(source), CorruptRecordPolicy::Fail) => Err(GuardError::Load { path: path.to_path_buf(),
                                                                               source }),
            (Err(source), CorruptRecordPolicy::Recompute) => {
                warn!("discarding unreadable guard record {}: {source}", path.display());
                Ok(None)
            }
        }
    }

    /// Persiste `value` en `path`, creando los directorios padre.
    pub fn persist(&self, path: &Path, value: &Value) -> Result<(), GuardError> {
        std::fs::create_dir_all(parent_dir(path))?;
        self.context_for(path)
            .and_then(|ctx| self.codec.save_json(value, path, Some(&ctx)))
            .map_err(|source| GuardError::Persist { path: path.to_path_buf(),
                                                    source })
    }
}

/// Un resultado nulo o ausente no crea registro.
pub fn is_persistable(value: &Value) -> bool {
    !(value.is_null() || value.is_absent())
}

/// `<dir>/<stem><ext>` + `name` → `<dir>/<stem>/<name><ext>`. `name` debe
/// ser un nombre de archivo simple para que el registro quede bajo `<stem>/`.
pub fn sub_location(base: &Path, name: &str) -> Result<PathBuf, GuardError> {
    if !is_plain_file_name(name) {
        return Err(GuardError::InvalidKey { key: name.to_string() });
    }
    let stem = base.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    let file_name = match base.extension() {
        Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
        None => name.to_string(),
    };
    Ok(parent_dir(base).join(stem).join(file_name))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
