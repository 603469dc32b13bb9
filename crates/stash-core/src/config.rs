//! Carga de valores por defecto del contexto desde variables de entorno.
//!
//! Convención `STASH_*`; el archivo `.env` se carga perezosamente una sola
//! vez. Estos valores sólo se usan cuando el `ContextBuilder` deja el campo
//! sin definir.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use log::{error, warn};
use once_cell::sync::Lazy;

pub const ENV_ARTIFACT_PATH: &str = "STASH_ARTIFACT_PATH";
pub const ENV_MAX_NBYTES: &str = "STASH_MAX_NBYTES";
pub const ENV_NODECODE: &str = "STASH_NODECODE";
pub const ENV_SHARED_KEY: &str = "STASH_SHARED_KEY";
pub const ENV_PREFIX: &str = "STASH_";
pub const ENV_FORMAT_SUFFIX: &str = "_FORMAT";

// Alias obsoletos, aceptados con aviso.
pub const ENV_LEGACY_ARTIFACT_PATH: &str = "STASH_BLOB_PATH";
pub const ENV_LEGACY_MAX_NBYTES: &str = "STASH_BLOB_MAX_NBYTES";

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// Valores leídos del entorno; todos opcionales.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub artifact_path: Option<PathBuf>,
    pub min_artifact_size: Option<usize>,
    pub nodecode_types: Option<Vec<String>>,
    pub shared_key: Option<Vec<u8>>,
    /// Opciones por dominio: `STASH_KERAS_FORMAT=h5` → `"keras.format" = "h5"`.
    pub formats: BTreeMap<String, String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        Self::from_vars(env::vars())
    }

    /// Construye la configuración a partir de pares arbitrarios (testeable sin
    /// tocar el entorno del proceso).
    pub fn from_vars<I, K, V>(vars: I) -> Self
        where I: IntoIterator<Item = (K, V)>,
              K: Into<String>,
              V: Into<String>
    {
        let vars: BTreeMap<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut cfg = EnvConfig::default();

        cfg.artifact_path = match (vars.get(ENV_ARTIFACT_PATH), vars.get(ENV_LEGACY_ARTIFACT_PATH)) {
            (Some(p), _) => Some(PathBuf::from(p)),
            (None, Some(p)) => {
                warn!("{ENV_LEGACY_ARTIFACT_PATH} is deprecated, use {ENV_ARTIFACT_PATH} instead");
                Some(PathBuf::from(p))
            }
            (None, None) => None,
        };

        let raw_size = match (vars.get(ENV_MAX_NBYTES), vars.get(ENV_LEGACY_MAX_NBYTES)) {
            (Some(v), _) => Some((ENV_MAX_NBYTES, v)),
            (None, Some(v)) => {
                warn!("{ENV_LEGACY_MAX_NBYTES} is deprecated, use {ENV_MAX_NBYTES} instead");
                Some((ENV_LEGACY_MAX_NBYTES, v))
            }
            (None, None) => None,
        };
        cfg.min_artifact_size = raw_size.and_then(|(name, v)| match v.trim().parse::<usize>() {
                                            Ok(n) => Some(n),
                                            Err(_) => {
                                                error!("invalid value for {name}: '{v}', expected a non-negative integer; ignoring");
                                                None
                                            }
                                        });

        cfg.nodecode_types = vars.get(ENV_NODECODE).map(|v| parse_list(v));
        cfg.shared_key = vars.get(ENV_SHARED_KEY).map(|v| v.as_bytes().to_vec());

        for (k, v) in vars.iter() {
            if let Some(domain) = k.strip_prefix(ENV_PREFIX).and_then(|r| r.strip_suffix(ENV_FORMAT_SUFFIX)) {
                if !domain.is_empty() {
                    cfg.formats.insert(format!("{}.format", domain.to_lowercase()), v.to_lowercase());
                }
            }
        }
        cfg
    }
}

/// Lista separada por comas, sin entradas vacías.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}
