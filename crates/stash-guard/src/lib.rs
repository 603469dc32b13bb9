//! stash-guard: memoización "calcular si no existe" sobre el codec.
//!
//! Bloques, iteraciones de bucle y llamadas de función se guardan en una
//! ubicación de salida. Una segunda ejecución encuentra el registro y omite el
//! trabajo. Sólo usa los puntos de entrada de alto nivel de `Codec`.
pub mod block;
pub mod call;
pub mod errors;
pub mod guard;
pub mod loops;

pub use block::GuardedBlock;
pub use call::GuardedCall;
pub use errors::GuardError;
pub use guard::{CorruptRecordPolicy, Guard};
pub use loops::{GuardedLoop, LoopStep};
