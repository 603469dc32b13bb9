//! Modelos neutrales (Value, Object, Envelope, ArtifactRef, ...)

pub mod envelope;
pub mod object;
pub mod value;

pub use envelope::{is_plain_file_name, ArtifactRef, Document, Envelope, EnvelopeSpec};
pub use object::Object;
pub use value::Value;
