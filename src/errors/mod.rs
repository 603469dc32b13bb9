//! Errores de la fachada.

pub mod stash_error;

pub use stash_error::StashError;
