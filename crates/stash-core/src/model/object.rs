//! Valores de dominio opacos para el motor.
//!
//! Un `Object` es cualquier tipo rico (bytes, fechas, colecciones propias...)
//! que sólo los adaptadores saben codificar. El motor únicamente necesita
//! clonarlo, compararlo y reportar su nombre de tipo en los errores.

use std::any::Any;
use std::fmt::Debug;

use super::Value;

/// Capacidad mínima de un valor de dominio.
///
/// Normalmente se implementa con `impl_object!`.
pub trait Object: Any + Debug + Send + Sync {
    /// Nombre del tipo en tiempo de ejecución (para errores `Unsupported`).
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn clone_object(&self) -> Box<dyn Object>;

    /// Igualdad entre objetos del mismo tipo concreto; tipos distintos nunca
    /// son iguales.
    fn eq_object(&self, other: &dyn Object) -> bool;

    /// Atributos nombrados expuestos al encoder genérico. `None` indica que el
    /// tipo no participa.
    fn attributes(&self) -> Option<Vec<(String, Value)>> {
        None
    }
}

impl Clone for Box<dyn Object> {
    fn clone(&self) -> Self {
        self.clone_object()
    }
}

impl PartialEq for Box<dyn Object> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref().eq_object(other.as_ref())
    }
}

/// Implementa `Object` para un tipo `Clone + PartialEq + Debug + Send + Sync`.
///
/// Formas soportadas:
/// - `impl_object!(MyType);`
/// - `impl_object!(MyType, attributes(this) { vec![("a".into(), this.a.clone().into())] });`
#[macro_export]
macro_rules! impl_object {
    (@common $ty:ty) => {
        fn type_name(&self) -> &'static str {
            std::any::type_name::<$ty>()
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn clone_object(&self) -> Box<dyn $crate::model::Object> {
            Box::new(self.clone())
        }

        fn eq_object(&self, other: &dyn $crate::model::Object) -> bool {
            other.as_any()
                 .downcast_ref::<$ty>()
                 .map_or(false, |o| o == self)
        }
    };
    ($ty:ty) => {
        impl $crate::model::Object for $ty {
            $crate::impl_object!(@common $ty);
        }
    };
    ($ty:ty, attributes($self_ident:ident) $body:block) => {
        impl $crate::model::Object for $ty {
            $crate::impl_object!(@common $ty);

            fn attributes(&self) -> Option<Vec<(String, $crate::model::Value)>> {
                let $self_ident = self;
                Some($body)
            }
        }
    };
}
