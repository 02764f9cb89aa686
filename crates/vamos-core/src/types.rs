//! Scalar field types of VAMOS events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of an event field.
///
/// Events carry flat payloads; the emitted runtime program stores them in
/// plain C structs, so every field type maps to a fixed C type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// C `int`
    Int,
    /// C `long`
    Long,
    /// C `float`
    Float,
    /// C `double`
    Double,
    /// C `bool`
    Bool,
    /// C `char *` (runtime-interned, see `shm_stream_get_str`)
    Str,
}

impl FieldType {
    /// The C type the field lowers to in emitted structs.
    pub fn c_name(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Bool => "bool",
            FieldType::Str => "char *",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Long | FieldType::Float | FieldType::Double
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Float => write!(f, "float"),
            FieldType::Double => write!(f, "double"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Str => write!(f, "string"),
        }
    }
}
