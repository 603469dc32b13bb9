use stash_core::CodecError;
use stash_guard::GuardError;
use thiserror::Error;

/// Error paraguas de la fachada: cualquier fallo del codec o de las guardas.
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Error de serialización: {0}")]
    Codec(#[from] CodecError),
    #[error("Error de guarda: {0}")]
    Guard(#[from] GuardError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
}

impl StashError {
    /// `true` si el error viene de un tipo sin adaptador.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, StashError::Codec(e) if e.is_unsupported())
    }
}
