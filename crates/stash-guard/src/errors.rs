//! Errores de la capa de guardas.

use std::path::PathBuf;

use stash_core::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Registro existente que no se pudo leer o decodificar.
    #[error("cannot load guard record {}: {source}", .path.display())]
    Load { path: PathBuf,
           #[source]
           source: CodecError },

    #[error("cannot persist guard record {}: {source}", .path.display())]
    Persist { path: PathBuf,
              #[source]
              source: CodecError },

    /// Fallo al codificar los argumentos de una llamada para derivar su slot.
    #[error("cannot fingerprint call arguments: {0}")]
    Fingerprint(#[source] CodecError),

    /// Nombre de sub-registro que no es un nombre de archivo simple.
    #[error("invalid guard key `{key}`: must be a single file name")]
    InvalidKey { key: String },

    #[error("guard I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Load { path, .. } | Self::Persist { path, .. } => Some(path),
            _ => None,
        }
    }
}
