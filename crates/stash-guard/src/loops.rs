//! Bucle protegido: un registro por clave, persistido en cuanto termina su
//! iteración. Un bucle interrumpido se reanuda ejecutando sólo las claves sin
//! registro.
//!
//! Máquina de estados explícita:
//! - `next_step()` avanza hasta la primera clave sin registro (las demás se
//!   cargan en la tabla de resultados) y la entrega al llamador;
//! - `complete(step, result)` persiste el resultado de esa clave y lo anota.
//!
//! `run` encadena ambos pasos con un closure.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use log::debug;
use stash_core::{Codec, Context, Value};

use crate::errors::GuardError;
use crate::guard::{is_persistable, sub_location, CorruptRecordPolicy, Guard};

/// Clave pendiente entregada al llamador.
#[derive(Debug)]
pub struct LoopStep<K> {
    key: K,
    path: PathBuf,
}

impl<K> LoopStep<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Ubicación donde se persistirá el resultado de esta clave.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
pub struct GuardedLoop<K> {
    base: PathBuf,
    name: Option<String>,
    guard: Guard,
    pending: std::vec::IntoIter<K>,
    results: Vec<(K, Option<Value>)>,
}

impl<K: Display> GuardedLoop<K> {
    pub fn new<I>(path: impl Into<PathBuf>, keys: I, codec: Codec) -> Self
        where I: IntoIterator<Item = K>
    {
        Self { base: path.into(),
               name: None,
               guard: Guard::new(codec),
               pending: keys.into_iter().collect::<Vec<_>>().into_iter(),
               results: Vec::new() }
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

    /// Ubicación del registro de `key`. La forma `Display` de la clave debe
    /// ser un nombre de archivo simple (sin `/` ni `..`).
    pub fn location(&self, key: &K) -> Result<PathBuf, GuardError> {
        sub_location(&self.base, &key.to_string())
    }

    pub fn next_step(&mut self) -> Result<Option<LoopStep<K>>, GuardError> {
        while let Some(key) = self.pending.next() {
            let path = self.location(&key)?;
            match self.guard.load(&path)? {
                Some(value) => {
                    if let Some(name) = &self.name {
                        debug!("skipped iteration '{key}' of guarded loop '{name}'");
                    }
                    self.results.push((key, Some(value)));
                }
                None => return Ok(Some(LoopStep { key, path })),
            }
        }
        Ok(None)
    }

    pub fn complete(&mut self, step: LoopStep<K>, result: Option<Value>) -> Result<(), GuardError> {
        if let Some(value) = result.as_ref().filter(|v| is_persistable(v)) {
            self.guard.persist(&step.path, value)?;
            if let Some(name) = &self.name {
                debug!("saved iteration '{}' of guarded loop '{name}' to '{}'", step.key, step.path.display());
            }
        }
        self.results.push((step.key, result));
        Ok(())
    }

    /// Ejecuta `f` para cada clave sin registro. Un error detiene el bucle; las
    /// claves ya completadas quedan persistidas.
    pub fn run<F, E>(&mut self, mut f: F) -> Result<&[(K, Option<Value>)], E>
        where F: FnMut(&K) -> Result<Option<Value>, E>,
              E: From<GuardError>
    {
        while let Some(step) = self.next_step()? {
            let result = f(step.key())?;
            self.complete(step, result)?;
        }
        Ok(self.results())
    }

    /// Pares `(clave, resultado)` en el orden de las claves.
    pub fn results(&self) -> &[(K, Option<Value>)] {
        &self.results
    }

    pub fn into_results(self) -> Vec<(K, Option<Value>)> {
        self.results
    }
}
