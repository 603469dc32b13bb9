//! stash-adapters: adaptadores de referencia sobre el contrato del registro.
//!
//! Cada módulo expone sus tipos de valor y una función `register` que añade
//! sus encoders y decoders a un `Registry`. `default_registry()` los combina
//! en el orden de sondeo documentado: los específicos primero y el genérico al
//! final.

pub mod bytes;
pub mod collections;
pub mod datetime;
pub mod dict;
pub mod embedded;
pub mod generic;

pub use bytes::Bytes;
pub use collections::{Deque, NamedTuple, ValueSet};
pub use dict::KeyedMap;
pub use embedded::{EmbeddedDict, EmbeddedList};

use stash_core::{Codec, Registry};

/// Registro con todos los adaptadores de referencia.
pub fn default_registry() -> Registry {
    let mut reg = Registry::new();
    embedded::register(&mut reg);
    bytes::register(&mut reg);
    collections::register(&mut reg);
    dict::register(&mut reg);
    datetime::register(&mut reg);
    generic::register(&mut reg);
    reg
}

pub fn default_codec() -> Codec {
    Codec::new(default_registry())
}
