//! Bloque protegido.
//!
//! ```ignore
//! let mut block = GuardedBlock::new("out/train.json", codec).name("train");
//! let result = block.run(|| -> Result<_, GuardError> { Ok(Some(expensive())) })?;
//! ```
//!
//! Si `out/train.json` existe el closure no se ejecuta y se devuelve el valor
//! persistido. Si el closure falla no se escribe nada.

use std::path::{Path, PathBuf};

use log::debug;
use stash_core::{Codec, Context, Value};

use crate::errors::GuardError;
use crate::guard::{is_persistable, CorruptRecordPolicy, Guard};

#[derive(Debug, Clone)]
pub struct GuardedBlock {
    path: PathBuf,
    name: Option<String>,
    guard: Guard,
    result: Option<Value>,
}

impl GuardedBlock {
    pub fn new(path: impl Into<PathBuf>, codec: Codec) -> Self {
        Self { path: path.into(),
               name: None,
               guard: Guard::new(codec),
               result: None }
    }

    /// Nombre para los logs.
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

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run<F, E>(&mut self, block: F) -> Result<Option<Value>, E>
        where F: FnOnce() -> Result<Option<Value>, E>,
              E: From<GuardError>
    {
        if let Some(value) = self.guard.load(&self.path)? {
            if let Some(name) = &self.name {
                debug!("skipped guarded block '{name}'");
            }
            self.result = Some(value.clone());
            return Ok(Some(value));
        }
        let result = block()?;
        if let Some(value) = result.as_ref().filter(|v| is_persistable(v)) {
            self.guard.persist(&self.path, value)?;
            if let Some(name) = &self.name {
                debug!("saved guarded block '{name}' results to '{}'", self.path.display());
            }
        }
        self.result = result.clone();
        Ok(result)
    }

    /// Resultado de la última ejecución (cargado o calculado).
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<Value> {
        self.result
    }
}
