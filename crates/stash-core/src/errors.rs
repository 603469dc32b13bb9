//! Errores del motor de (de)serialización.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Ningún encoder acepta el valor. Dentro del dispatcher significa
    /// "probar el siguiente"; sólo es fatal si escapa de `Codec::encode`.
    #[error("unsupported type `{type_name}` at {path}")]
    Unsupported { type_name: String, path: String },

    #[error("cannot deserialize `{tag}` (version {}) at {path}: {reason}", .version.map(|v| v.to_string()).unwrap_or_else(|| "?".into()))]
    Deserialization { tag: String,
                      version: Option<u32>,
                      path: String,
                      reason: String },

    /// Omisión intencional configurada en el contexto. El dispatcher la
    /// convierte en `Value::Absent`.
    #[error("decoding of `{tag}` is disabled in this context")]
    Nodecode { tag: String },

    #[error("artifact I/O error at {path} ({}): {source}", .file.display())]
    Artifact { path: String,
               file: PathBuf,
               #[source]
               source: std::io::Error },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn unsupported(type_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Unsupported { type_name: type_name.into(),
                            path: path.into() }
    }

    pub fn deserialization(tag: impl Into<String>, version: Option<u32>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Deserialization { tag: tag.into(),
                                version,
                                path: path.into(),
                                reason: reason.into() }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub fn is_nodecode(&self) -> bool {
        matches!(self, Self::Nodecode { .. })
    }

    /// Tipo de error de E/S subyacente, si lo hay.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Artifact { source, .. } | Self::Io(source) => Some(source.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization_message_names_tag_and_version() {
        let err = CodecError::deserialization("x.y", Some(99), "$.a", "unknown version");
        assert_eq!(err.to_string(), "cannot deserialize `x.y` (version 99) at $.a: unknown version");
    }

    #[test]
    fn deserialization_message_without_version() {
        let err = CodecError::deserialization("x.y", None, "$", "missing __version__");
        assert_eq!(err.to_string(), "cannot deserialize `x.y` (version ?) at $: missing __version__");
    }

    #[test]
    fn unsupported_message_names_type() {
        let err = CodecError::unsupported("my::Thing", "$.0");
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "unsupported type `my::Thing` at $.0");
    }

    #[test]
    fn artifact_error_keeps_io_kind() {
        let err = CodecError::Artifact { path: "$".into(),
                                         file: PathBuf::from("/nope/x.blob"),
                                         source: std::io::Error::from(std::io::ErrorKind::NotFound) };
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }
}
