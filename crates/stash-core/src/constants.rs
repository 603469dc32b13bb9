//! Constantes del protocolo de sobres y valores por defecto del contexto.
//!
//! Las claves reservadas forman parte del formato en disco: cambiarlas rompe
//! la lectura de documentos ya persistidos.

/// Versión lógica del motor. Participa en el hash de las llamadas protegidas
/// (`stash-guard`), de modo que un cambio incompatible del motor invalida los
/// slots derivados de argumentos en vez de reutilizarlos.
pub const ENGINE_VERSION: &str = "S1.0";

/// Clave reservada que lleva el tag (con namespace por puntos) del sobre.
pub const TYPE_KEY: &str = "__type__";

/// Clave reservada que lleva la versión de esquema (entero positivo).
pub const VERSION_KEY: &str = "__version__";

/// Campo de un sobre con datos inline (base64).
pub const DATA_KEY: &str = "data";

/// Campo de un sobre que referencia un artifact externo.
pub const ID_KEY: &str = "id";

/// Localizador raíz del documento.
pub const ROOT_PATH: &str = "$";

/// Umbral inline por defecto (bytes). Un payload de tamaño `<=` se queda en el
/// documento.
pub const DEFAULT_MIN_ARTIFACT_SIZE: usize = 8_000;

/// Extensión por defecto de los artifacts binarios.
pub const ARTIFACT_EXTENSION: &str = "blob";

/// Extensión de los artifacts que contienen documentos JSON embebidos.
pub const JSON_EXTENSION: &str = "json";
