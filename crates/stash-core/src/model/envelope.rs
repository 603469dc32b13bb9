//! Protocolo de sobres tipados.
//!
//! Un sobre es un objeto JSON con dos claves reservadas:
//! - `__type__`: tag con namespace por puntos (`"collections.deque"`).
//! - `__version__`: versión de esquema, entero positivo.
//!
//! El resto de campos los define el par (tag, versión). El decoder se elige
//! siempre por el par completo, nunca sólo por el tag: una versión nueva de un
//! adaptador puede cambiar la forma de los campos mientras los documentos
//! antiguos siguen siendo legibles con el decoder viejo registrado al lado.

use std::path::{Component, Path};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::constants::{ID_KEY, ROOT_PATH, TYPE_KEY, VERSION_KEY};
use crate::errors::CodecError;

/// Nodo de documento (modelo de cable).
pub type Document = serde_json::Value;

/// Referencia a un artifact externo, `{ "id": <uuid> }` dentro de un sobre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: String,
}

impl ArtifactRef {
    /// Referencia leída de un documento. El id debe ser un único nombre de
    /// archivo: sin separadores, sin `.`/`..` y sin raíz.
    pub fn parse(id: &str) -> Result<Self, String> {
        if is_plain_file_name(id) {
            Ok(Self { id: id.to_string() })
        } else {
            Err(format!("invalid artifact id `{id}`"))
        }
    }
}

/// `true` si `name` es un único componente de ruta normal.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut parts = Path::new(name).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub tag: String,
    pub version: u32,
    pub fields: Map<String, Document>,
    /// Localizador del sobre dentro del documento (sólo diagnóstico).
    pub path: String,
}

impl Envelope {
    pub fn new(tag: impl Into<String>, version: u32) -> Self {
        Self { tag: tag.into(),
               version,
               fields: Map::new(),
               path: ROOT_PATH.to_string() }
    }

    /// Añade (o reemplaza) un campo específico del tag.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Document>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Campo obligatorio; su ausencia es un sobre malformado.
    pub fn field(&self, key: &str) -> Result<&Document, CodecError> {
        self.fields.get(key).ok_or_else(|| self.malformed(format!("missing field `{key}`")))
    }

    pub fn take_field(&mut self, key: &str) -> Result<Document, CodecError> {
        self.fields.remove(key).ok_or_else(|| self.malformed(format!("missing field `{key}`")))
    }

    pub fn str_field(&self, key: &str) -> Result<&str, CodecError> {
        self.field(key)?.as_str().ok_or_else(|| self.malformed(format!("field `{key}` must be a string")))
    }

    pub fn i64_field(&self, key: &str) -> Result<i64, CodecError> {
        self.field(key)?.as_i64().ok_or_else(|| self.malformed(format!("field `{key}` must be an integer")))
    }

    /// Referencia a artifact guardada en el campo `id`.
    pub fn artifact_field(&self) -> Result<ArtifactRef, CodecError> {
        ArtifactRef::parse(self.str_field(ID_KEY)?).map_err(|reason| self.malformed(reason))
    }

    /// Error de deserialización con el tag, versión y localizador del sobre.
    pub fn malformed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::deserialization(&self.tag, Some(self.version), &self.path, reason)
    }

    /// Reconoce un sobre dentro de un nodo.
    ///
    /// - `None`: el nodo no es un sobre (no es objeto o no lleva `__type__`).
    /// - `Some(Err(..))`: lleva `__type__` pero el tag o la versión son
    ///   inválidos.
    pub fn detect(doc: &Document, path: &str) -> Option<Result<Envelope, CodecError>> {
        let map = doc.as_object()?;
        let raw_tag = map.get(TYPE_KEY)?;
        Some(Self::parse(map, raw_tag, path))
    }

    fn parse(map: &Map<String, Document>, raw_tag: &Document, path: &str) -> Result<Envelope, CodecError> {
        let tag = raw_tag.as_str()
                         .ok_or_else(|| CodecError::deserialization(raw_tag.to_string(), None, path, "`__type__` must be a string"))?;
        let version = map.get(VERSION_KEY)
                         .and_then(Document::as_u64)
                         .filter(|v| *v > 0 && *v <= u32::MAX as u64)
                         .ok_or_else(|| CodecError::deserialization(tag, None, path, "missing or invalid `__version__`"))?;
        let fields = map.iter()
                        .filter(|(k, _)| k.as_str() != TYPE_KEY && k.as_str() != VERSION_KEY)
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
        Ok(Envelope { tag: tag.to_string(),
                      version: version as u32,
                      fields,
                      path: path.to_string() })
    }

    /// Forma de cable: campos + claves reservadas.
    pub fn into_document(self) -> Document {
        let mut map = self.fields;
        map.insert(TYPE_KEY.to_string(), Document::from(self.tag));
        map.insert(VERSION_KEY.to_string(), Document::from(self.version));
        Document::Object(map)
    }
}

impl From<Envelope> for Document {
    fn from(env: Envelope) -> Self {
        env.into_document()
    }
}

/// Sobre con una forma de campos fija descrita por serde.
///
/// Implementado por tipos de datos cuyos campos se pueden derivar con
/// `Serialize`/`Deserialize` sin recursión a través del dispatcher.
pub trait EnvelopeSpec: Sized + Serialize + DeserializeOwned {
    /// Tag del sobre.
    const TAG: &'static str;
    /// Versión de esquema (incrementar en cambios incompatibles).
    const VERSION: u32 = 1;

    /// Validación semántica ligera (sin efectos secundarios). Opcional.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn into_envelope(&self) -> Result<Envelope, CodecError> {
        match serde_json::to_value(self)? {
            Document::Object(fields) => Ok(Envelope { tag: Self::TAG.to_string(),
                                                      version: Self::VERSION,
                                                      fields,
                                                      path: ROOT_PATH.to_string() }),
            other => Err(CodecError::deserialization(Self::TAG,
                                                     Some(Self::VERSION),
                                                     ROOT_PATH,
                                                     format!("fields must serialize to an object, got {other}"))),
        }
    }

    /// Decodifica verificando tag, versión y validación.
    fn from_envelope(env: &Envelope) -> Result<Self, CodecError> {
        if env.tag != Self::TAG {
            return Err(env.malformed(format!("expected tag `{}`", Self::TAG)));
        }
        if env.version != Self::VERSION {
            return Err(env.malformed(format!("expected version {}", Self::VERSION)));
        }
        let decoded: Self = serde_json::from_value(Document::Object(env.fields.clone())).map_err(|e| env.malformed(e.to_string()))?;
        decoded.validate().map_err(|e| env.malformed(e))?;
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Span {
        start: i64,
        end: i64,
    }

    impl EnvelopeSpec for Span {
        const TAG: &'static str = "test.span";
        const VERSION: u32 = 2;

        fn validate(&self) -> Result<(), String> {
            if self.start <= self.end { Ok(()) } else { Err("start > end".into()) }
        }
    }

    #[test]
    fn plain_objects_are_not_envelopes() {
        assert!(Envelope::detect(&json!({"a": 1}), "$").is_none());
        assert!(Envelope::detect(&json!([1, 2]), "$").is_none());
    }

    #[test]
    fn detect_reads_reserved_keys() {
        let env = Envelope::detect(&json!({"__type__": "x.y", "__version__": 3, "k": true}), "$.a").unwrap()
                                                                                                   .unwrap();
        assert_eq!(env.tag, "x.y");
        assert_eq!(env.version, 3);
        assert_eq!(env.path, "$.a");
        assert_eq!(env.fields.len(), 1);
    }

    #[test]
    fn missing_version_is_malformed() {
        let res = Envelope::detect(&json!({"__type__": "x.y"}), "$").unwrap();
        assert!(matches!(res, Err(CodecError::Deserialization { .. })));
        let res = Envelope::detect(&json!({"__type__": "x.y", "__version__": 0}), "$").unwrap();
        assert!(res.is_err());
    }

    #[test]
    fn document_round_trip() {
        let doc = Envelope::new("x.y", 1).with_field("n", 5).into_document();
        assert_eq!(doc, json!({"__type__": "x.y", "__version__": 1, "n": 5}));
    }

    #[test]
    fn spec_checks_version_and_validates() {
        let env = Span { start: 1, end: 4 }.into_envelope().unwrap();
        assert_eq!(Span::from_envelope(&env).unwrap(), Span { start: 1, end: 4 });

        let mut old = env.clone();
        old.version = 1;
        assert!(Span::from_envelope(&old).is_err());

        let bad = Span { start: 9, end: 4 }.into_envelope().unwrap();
        let err = Span::from_envelope(&bad).unwrap_err();
        assert!(err.to_string().contains("start > end"));
    }

    #[test]
    fn artifact_ids_are_single_file_names() {
        assert!(ArtifactRef::parse("0b9d6c1e-5a0f-4a57-9f0e-3f1e2b7c8d90").is_ok());
        for bad in ["", ".", "..", "../x", "a/b", "/etc/passwd", "a\\b"] {
            assert!(ArtifactRef::parse(bad).is_err(), "{bad}");
        }

        let env = Envelope::new("x.y", 3).with_field("id", "../secret");
        let err = env.artifact_field().unwrap_err();
        assert!(matches!(err, CodecError::Deserialization { version: Some(3), .. }));
        assert!(err.to_string().contains("invalid artifact id"));
    }

    #[test]
    fn missing_field_names_tag() {
        let env = Envelope::new("x.y", 1);
        let err = env.field("data").unwrap_err();
        assert!(err.to_string().contains("x.y"));
        assert!(err.to_string().contains("missing field `data`"));
    }
}
