//! stash-core: motor de serialización objeto → documento JSON.
//!
//! Sobres versionados, contexto por operación, almacén de artifacts, filtro
//! nodecode y el dispatcher (`Codec`) sobre un registro explícito de
//! adaptadores.
pub mod artifact;
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod hashing;
pub mod model;
pub mod registry;

pub use artifact::{write_atomic, ArtifactStore, Payload};
pub use codec::Codec;
pub use config::EnvConfig;
pub use context::{Context, ContextBuilder};
pub use errors::CodecError;
pub use model::{is_plain_file_name, ArtifactRef, Document, Envelope, EnvelopeSpec, Object, Value};
pub use registry::{Decoder, Encoder, FnDecoder, FnEncoder, Registry};

// `impl_object!` se exporta en la raíz vía #[macro_export].
