//! Contexto de (de)serialización.
//!
//! Un `Context` viaja por cada llamada de encode/decode con la configuración
//! de la operación y la posición actual dentro del documento. Es un valor:
//! nada se muta tras construirlo. Descender a un hijo produce un contexto
//! derivado (`with_child`) idéntico salvo por el localizador; las partes
//! compartidas van detrás de `Arc`, por lo que derivar es barato.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::artifact::ArtifactStore;
use crate::config::EnvConfig;
use crate::constants::{DEFAULT_MIN_ARTIFACT_SIZE, ROOT_PATH};
use crate::errors::CodecError;
use crate::model::{ArtifactRef, Document};

#[derive(Debug, Clone)]
pub struct Context {
    json_path: String,
    file_path: Option<Arc<PathBuf>>,
    artifact_path: Arc<PathBuf>,
    min_artifact_size: usize,
    nodecode_types: Arc<[String]>,
    options: Arc<BTreeMap<String, Document>>,
    shared_key: Option<Arc<[u8]>>,
    /// Directorio temporal propio, creado con el primer artifact.
    lazy_artifact_dir: bool,
    fingerprint_only: bool,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Contexto con valores de entorno y por defecto.
    pub fn new() -> Result<Self, CodecError> {
        Self::builder().build()
    }

    /// Contexto para un documento principal en `path`; los artifacts van a su
    /// directorio padre salvo que el entorno diga otra cosa.
    pub fn for_file(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        Self::builder().file_path(path.as_ref()).build()
    }

    /// Copia del contexto con el localizador extendido por `key`.
    pub fn with_child(&self, key: impl Display) -> Context {
        Context { json_path: format!("{}.{}", self.json_path, key),
                  ..self.clone() }
    }

    /// Identificador nuevo de artifact (UUID v4, 128 bits aleatorios).
    pub fn new_artifact_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Ruta de un artifact nuevo junto con su identificador.
    pub fn new_artifact_path(&self, extension: &str) -> (PathBuf, String) {
        let id = self.new_artifact_id();
        (self.artifact_path.join(format!("{id}.{extension}")), id)
    }

    /// Ruta dentro del directorio de artifacts que corresponde a `id`. Un id
    /// que no sea un nombre de archivo simple se rechaza.
    pub fn id_to_artifact_path(&self, id: &str, extension: &str) -> Result<PathBuf, CodecError> {
        let reference = ArtifactRef::parse(id).map_err(|reason| CodecError::deserialization("artifact", None, &self.json_path, reason))?;
        Ok(self.artifact_path.join(format!("{}.{extension}", reference.id)))
    }

    /// `true` si `tag` o alguno de sus prefijos con punto está en la lista
    /// nodecode (`"a"` cubre `"a"` y `"a.b"`, pero no `"ab"`).
    pub fn is_nodecode(&self, tag: &str) -> bool {
        self.nodecode_types.iter().any(|t| {
                                      tag == t
                                      || (tag.len() > t.len() && tag.starts_with(t.as_str()) && tag.as_bytes()[t.len()] == b'.')
                                  })
    }

    /// Señal de omisión intencional; el dispatcher la convierte en
    /// `Value::Absent`.
    pub fn raise_if_nodecode(&self, tag: &str) -> Result<(), CodecError> {
        if self.is_nodecode(tag) {
            return Err(CodecError::Nodecode { tag: tag.to_string() });
        }
        Ok(())
    }

    /// Almacén de artifacts ligado a este contexto.
    pub fn artifacts(&self) -> ArtifactStore<'_> {
        ArtifactStore::new(self)
    }

    pub fn json_path(&self) -> &str {
        &self.json_path
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref().map(PathBuf::as_path)
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// `true` si el directorio de artifacts es un temporal aún sin crear.
    pub fn is_lazy_artifact_dir(&self) -> bool {
        self.lazy_artifact_dir
    }

    /// En modo huella los artifacts no se escriben y su id es el hash del
    /// contenido.
    pub fn is_fingerprint_only(&self) -> bool {
        self.fingerprint_only
    }

    pub fn min_artifact_size(&self) -> usize {
        self.min_artifact_size
    }

    pub fn nodecode_types(&self) -> &[String] {
        &self.nodecode_types
    }

    /// Opción por dominio (p.ej. `"keras.format"`). Opaca para el motor.
    pub fn option(&self, key: &str) -> Option<&Document> {
        self.options.get(key)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.option(key).and_then(Document::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, Document> {
        &self.options
    }

    pub fn shared_key(&self) -> Option<&[u8]> {
        self.shared_key.as_deref()
    }

    /// Nuevo contexto para otro documento principal, conservando el resto de la
    /// configuración. El directorio de artifacts pasa a ser el padre de `path`.
    pub fn rebased_on_file(&self, path: impl AsRef<Path>) -> Context {
        let path = path.as_ref().to_path_buf();
        let parent = parent_dir(&path);
        Context { json_path: ROOT_PATH.to_string(),
                  file_path: Some(Arc::new(path)),
                  artifact_path: Arc::new(parent),
                  lazy_artifact_dir: false,
                  ..self.clone() }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Constructor de `Context`. Campos sin definir toman el valor del entorno
/// (`config::EnvConfig`) y, en su defecto, el valor por defecto.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    json_path: Option<String>,
    file_path: Option<PathBuf>,
    artifact_path: Option<PathBuf>,
    min_artifact_size: Option<usize>,
    nodecode_types: Option<Vec<String>>,
    options: BTreeMap<String, Document>,
    shared_key: Option<Vec<u8>>,
    fingerprint_only: bool,
    env: Option<EnvConfig>,
}

impl ContextBuilder {
    pub fn json_path(mut self, path: impl Into<String>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    /// Umbral inline en bytes; `0` externaliza todo payload elegible.
    pub fn min_artifact_size(mut self, nbytes: usize) -> Self {
        self.min_artifact_size = Some(nbytes);
        self
    }

    pub fn nodecode_types<I, S>(mut self, tags: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.nodecode_types = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Document>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn shared_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.shared_key = Some(key.into());
        self
    }

    /// Artifacts con id derivado del contenido y sin escritura en disco.
    pub fn fingerprint_only(mut self, enabled: bool) -> Self {
        self.fingerprint_only = enabled;
        self
    }

    /// Usa esta configuración de entorno en lugar de leer el del proceso.
    pub fn env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    pub fn build(self) -> Result<Context, CodecError> {
        let env = self.env.unwrap_or_else(EnvConfig::from_env);

        let (artifact_path, lazy_artifact_dir) = match (self.artifact_path, env.artifact_path, self.file_path.as_deref()) {
            (Some(p), _, _) => (p, false),
            (None, Some(p), _) => (p, false),
            (None, None, Some(file)) => (parent_dir(file), false),
            (None, None, None) => (fresh_temp_dir(), true),
        };

        let mut options: BTreeMap<String, Document> = env.formats
                                                         .into_iter()
                                                         .map(|(k, v)| (k, Document::from(v)))
                                                         .collect();
        options.extend(self.options);

        Ok(Context { json_path: self.json_path.unwrap_or_else(|| ROOT_PATH.to_string()),
                     file_path: self.file_path.map(Arc::new),
                     artifact_path: Arc::new(artifact_path),
                     min_artifact_size: self.min_artifact_size
                                            .or(env.min_artifact_size)
                                            .unwrap_or(DEFAULT_MIN_ARTIFACT_SIZE),
                     nodecode_types: self.nodecode_types
                                         .or(env.nodecode_types)
                                         .unwrap_or_default()
                                         .into(),
                     options: Arc::new(options),
                     shared_key: self.shared_key.or(env.shared_key).map(Into::into),
                     lazy_artifact_dir,
                     fingerprint_only: self.fingerprint_only })
    }
}

fn fresh_temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("stash-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(tags: &[&str]) -> Context {
        Context::builder().env(EnvConfig::default())
                          .artifact_path(".")
                          .nodecode_types(tags.iter().copied())
                          .build()
                          .unwrap()
    }

    #[test]
    fn child_extends_path_only() {
        let ctx = ctx_with(&["bytes"]);
        let child = ctx.with_child("a").with_child(3);
        assert_eq!(child.json_path(), "$.a.3");
        assert_eq!(child.artifact_path(), ctx.artifact_path());
        assert_eq!(child.nodecode_types(), ctx.nodecode_types());
        assert_eq!(ctx.json_path(), "$");
    }

    #[test]
    fn nodecode_matches_dotted_prefixes() {
        let ctx = ctx_with(&["datetime", "collections.set"]);
        assert!(ctx.is_nodecode("datetime"));
        assert!(ctx.is_nodecode("datetime.time"));
        assert!(!ctx.is_nodecode("datetimes"));
        assert!(ctx.is_nodecode("collections.set"));
        assert!(!ctx.is_nodecode("collections.deque"));
        assert!(ctx.raise_if_nodecode("datetime.time").unwrap_err().is_nodecode());
        assert!(ctx.raise_if_nodecode("bytes").is_ok());
    }

    #[test]
    fn artifact_ids_are_unique() {
        let ctx = ctx_with(&[]);
        let a = ctx.new_artifact_id();
        let b = ctx.new_artifact_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        let (path, id) = ctx.new_artifact_path("blob");
        assert_eq!(path, PathBuf::from(".").join(format!("{id}.blob")));
    }

    #[test]
    fn artifact_dir_defaults_to_file_parent() {
        let ctx = Context::builder().env(EnvConfig::default())
                                    .file_path("out/doc.json")
                                    .build()
                                    .unwrap();
        assert_eq!(ctx.artifact_path(), Path::new("out"));
        assert_eq!(ctx.file_path(), Some(Path::new("out/doc.json")));

        let bare = Context::builder().env(EnvConfig::default()).file_path("doc.json").build().unwrap();
        assert_eq!(bare.artifact_path(), Path::new("."));
    }

    #[test]
    fn artifact_dir_defaults_to_fresh_temp_dir() {
        let a = Context::builder().env(EnvConfig::default()).build().unwrap();
        let b = Context::builder().env(EnvConfig::default()).build().unwrap();
        assert_ne!(a.artifact_path(), b.artifact_path());
        assert!(a.is_lazy_artifact_dir());
        assert!(!a.artifact_path().exists());

        let r = a.artifacts().externalize(b"x").unwrap();
        assert!(a.artifact_path().is_dir());
        assert_eq!(a.artifacts().resolve(&r).unwrap(), b"x");
        assert!(!b.artifact_path().exists());
        let _ = std::fs::remove_dir_all(a.artifact_path());
    }

    #[test]
    fn artifact_paths_stay_inside_the_directory() {
        let ctx = ctx_with(&[]).with_child("blob");
        assert_eq!(ctx.id_to_artifact_path("abc", "blob").unwrap(), PathBuf::from("./abc.blob"));
        for id in ["../abc", "/tmp/abc", "a/b", ".."] {
            let err = ctx.id_to_artifact_path(id, "blob").unwrap_err();
            assert!(matches!(err, CodecError::Deserialization { ref path, .. } if path == "$.blob"), "{id}");
        }
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let env = EnvConfig::from_vars([("STASH_MAX_NBYTES", "10"),
                                        ("STASH_NODECODE", "bytes"),
                                        ("STASH_ARTIFACT_PATH", "/env/dir"),
                                        ("STASH_PANDAS_FORMAT", "csv")]);
        let from_env = Context::builder().env(env.clone()).build().unwrap();
        assert_eq!(from_env.min_artifact_size(), 10);
        assert_eq!(from_env.nodecode_types(), ["bytes".to_string()]);
        assert_eq!(from_env.artifact_path(), Path::new("/env/dir"));
        assert_eq!(from_env.option_str("pandas.format"), Some("csv"));

        let explicit = Context::builder().env(env)
                                         .min_artifact_size(0)
                                         .nodecode_types(Vec::<String>::new())
                                         .artifact_path("/x")
                                         .option("pandas.format", "parquet")
                                         .build()
                                         .unwrap();
        assert_eq!(explicit.min_artifact_size(), 0);
        assert!(explicit.nodecode_types().is_empty());
        assert_eq!(explicit.artifact_path(), Path::new("/x"));
        assert_eq!(explicit.option_str("pandas.format"), Some("parquet"));
    }

    #[test]
    fn default_threshold_and_shared_key() {
        let ctx = Context::builder().env(EnvConfig::default())
                                    .artifact_path(".")
                                    .shared_key(b"secret".to_vec())
                                    .build()
                                    .unwrap();
        assert_eq!(ctx.min_artifact_size(), DEFAULT_MIN_ARTIFACT_SIZE);
        assert_eq!(ctx.shared_key(), Some(&b"secret"[..]));
    }

    #[test]
    fn rebase_moves_artifacts_next_to_file() {
        let ctx = ctx_with(&["bytes"]).with_child("x");
        let rebased = ctx.rebased_on_file("a/b/c.json");
        assert_eq!(rebased.json_path(), "$");
        assert_eq!(rebased.artifact_path(), Path::new("a/b"));
        assert!(rebased.is_nodecode("bytes"));
    }
}
