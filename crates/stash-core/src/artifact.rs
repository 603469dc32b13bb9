//! Almacén de artifacts.
//!
//! Cuándo externalizar es una decisión de cada adaptador (cada tipo de payload
//! tiene su propio coste inline). La mecánica de nombrar, escribir y leer
//! archivos sí está centralizada aquí:
//! - un archivo plano `<id>.<ext>` por payload dentro del directorio de
//!   artifacts del contexto;
//! - referencias relativas a ese directorio, de modo que documento y
//!   artifacts se pueden mover juntos;
//! - escrituras atómicas (archivo temporal + rename).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use uuid::Uuid;

use crate::constants::{ARTIFACT_EXTENSION, DATA_KEY, ID_KEY};
use crate::context::Context;
use crate::errors::CodecError;
use crate::hashing::hash_bytes;
use crate::model::{ArtifactRef, Document, Envelope};

/// Escribe `bytes` en `path` pasando por un archivo temporal hermano y un
/// `rename`, para que ningún lector observe un archivo a medio escribir.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Vista del almacén sobre el directorio de artifacts de un contexto.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactStore<'a> {
    ctx: &'a Context,
}

impl<'a> ArtifactStore<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn externalize(&self, bytes: &[u8]) -> Result<ArtifactRef, CodecError> {
        self.externalize_with_extension(bytes, ARTIFACT_EXTENSION)
    }

    /// Escribe un artifact nuevo y devuelve su referencia. En modo huella no
    /// escribe nada y el id es el hash de `bytes`.
    pub fn externalize_with_extension(&self, bytes: &[u8], extension: &str) -> Result<ArtifactRef, CodecError> {
        if self.ctx.is_fingerprint_only() {
            return Ok(ArtifactRef { id: hash_bytes(bytes) });
        }
        if self.ctx.is_lazy_artifact_dir() {
            let dir = self.ctx.artifact_path();
            fs::create_dir_all(dir).map_err(|e| self.io_error(dir, e))?;
        }
        let (path, id) = self.ctx.new_artifact_path(extension);
        write_atomic(&path, bytes).map_err(|e| self.io_error(&path, e))?;
        debug!("wrote artifact {} ({} bytes) at {}", path.display(), bytes.len(), self.ctx.json_path());
        Ok(ArtifactRef { id })
    }

    pub fn resolve(&self, reference: &ArtifactRef) -> Result<Vec<u8>, CodecError> {
        self.resolve_with_extension(reference, ARTIFACT_EXTENSION)
    }

    /// Lee el artifact referenciado. Un archivo ausente es un error de E/S
    /// (no se reintenta).
    pub fn resolve_with_extension(&self, reference: &ArtifactRef, extension: &str) -> Result<Vec<u8>, CodecError> {
        let path = self.path_of(reference, extension)?;
        fs::read(&path).map_err(|e| self.io_error(&path, e))
    }

    pub fn path_of(&self, reference: &ArtifactRef, extension: &str) -> Result<PathBuf, CodecError> {
        self.ctx.id_to_artifact_path(&reference.id, extension)
    }

    /// Aplica el umbral del contexto: `len <= min_artifact_size` queda inline.
    pub fn store(&self, bytes: Vec<u8>) -> Result<Payload, CodecError> {
        if bytes.len() <= self.ctx.min_artifact_size() {
            Ok(Payload::Inline(bytes))
        } else {
            self.externalize(&bytes).map(Payload::External)
        }
    }

    fn io_error(&self, file: &Path, source: std::io::Error) -> CodecError {
        CodecError::Artifact { path: self.ctx.json_path().to_string(),
                               file: file.to_path_buf(),
                               source }
    }
}

/// Payload binario de un sobre: inline (`"data"`, base64) o externo (`"id"`).
/// Ambos campos son mutuamente excluyentes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Inline(Vec<u8>),
    External(ArtifactRef),
}

impl Payload {
    pub fn is_inline(&self) -> bool {
        matches!(self, Payload::Inline(_))
    }

    /// Añade el campo correspondiente al sobre.
    pub fn write_into(&self, envelope: Envelope) -> Envelope {
        match self {
            Payload::Inline(bytes) => envelope.with_field(DATA_KEY, BASE64.encode(bytes)),
            Payload::External(r) => envelope.with_field(ID_KEY, r.id.clone()),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Payload, CodecError> {
        match (envelope.fields.get(DATA_KEY), envelope.fields.get(ID_KEY)) {
            (Some(_), Some(_)) => Err(envelope.malformed("`data` and `id` are mutually exclusive")),
            (Some(Document::String(encoded)), None) => {
                BASE64.decode(encoded)
                      .map(Payload::Inline)
                      .map_err(|e| envelope.malformed(format!("invalid base64 in `data`: {e}")))
            }
            (None, Some(Document::String(_))) => envelope.artifact_field().map(Payload::External),
            (None, None) => Err(envelope.malformed("expected `data` or `id`")),
            _ => Err(envelope.malformed("`data`/`id` must be strings")),
        }
    }

    /// Bytes del payload, leyendo el artifact si es externo.
    pub fn load(self, ctx: &Context) -> Result<Vec<u8>, CodecError> {
        match self {
            Payload::Inline(bytes) => Ok(bytes),
            Payload::External(r) => ctx.artifacts().resolve(&r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;

    fn ctx_in(dir: &Path, threshold: usize) -> Context {
        Context::builder().env(EnvConfig::default())
                          .artifact_path(dir)
                          .min_artifact_size(threshold)
                          .build()
                          .unwrap()
    }

    #[test]
    fn externalize_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path(), 0);
        let r = ctx.artifacts().externalize(b"hello").unwrap();
        assert!(dir.path().join(format!("{}.blob", r.id)).is_file());
        assert_eq!(ctx.artifacts().resolve(&r).unwrap(), b"hello");
    }

    #[test]
    fn missing_artifact_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path(), 0).with_child("payload");
        let err = ctx.artifacts()
                     .resolve(&ArtifactRef { id: "nope".into() })
                     .unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
        assert!(err.to_string().contains("$.payload"));
    }

    #[test]
    fn references_cannot_leave_the_artifact_directory() {
        let secret_dir = tempfile::tempdir().unwrap();
        std::fs::write(secret_dir.path().join("secret.blob"), b"TOPSECRET").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path(), 0);

        let absolute = secret_dir.path().join("secret").to_string_lossy().into_owned();
        let escaping = format!("../{}/secret", secret_dir.path().file_name().unwrap().to_string_lossy());
        for id in [absolute, escaping] {
            let env = Envelope::new("bytes", 3).with_field("id", id.as_str());
            assert!(matches!(Payload::from_envelope(&env), Err(CodecError::Deserialization { .. })), "{id}");
            let err = ctx.artifacts().resolve(&ArtifactRef { id: id.clone() }).unwrap_err();
            assert!(matches!(err, CodecError::Deserialization { .. }), "{id}");
        }
    }

    #[test]
    fn fingerprint_mode_uses_content_ids_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::builder().env(EnvConfig::default())
                                    .artifact_path(dir.path())
                                    .fingerprint_only(true)
                                    .build()
                                    .unwrap();
        let a = ctx.artifacts().externalize(b"same").unwrap();
        let b = ctx.artifacts().externalize(b"same").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ctx.artifacts().externalize(b"other").unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_directory_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(&dir.path().join("missing"), 0);
        let err = ctx.artifacts().externalize(b"x").unwrap_err();
        assert!(matches!(err, CodecError::Artifact { .. }));
    }

    #[test]
    fn threshold_is_inclusive_on_inline_side() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path(), 4);
        assert!(ctx.artifacts().store(vec![0; 4]).unwrap().is_inline());
        assert!(!ctx.artifacts().store(vec![0; 5]).unwrap().is_inline());

        let zero = ctx_in(dir.path(), 0);
        assert!(zero.artifacts().store(Vec::new()).unwrap().is_inline());
        assert!(!zero.artifacts().store(vec![1]).unwrap().is_inline());
    }

    #[test]
    fn payload_fields_are_exclusive() {
        let env = Envelope::new("x", 1).with_field("data", "AA==").with_field("id", "abc");
        assert!(Payload::from_envelope(&env).is_err());
        assert!(Payload::from_envelope(&Envelope::new("x", 1)).is_err());

        let inline = Payload::Inline(vec![1, 2, 3]).write_into(Envelope::new("x", 1));
        assert_eq!(Payload::from_envelope(&inline).unwrap(), Payload::Inline(vec![1, 2, 3]));
    }

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
