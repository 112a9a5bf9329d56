use crate::middle::{mir::RegisterId, ty::AdtId};

/// A runtime value produced during compile-time evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Struct {
        adt: AdtId,
        fields: Vec<Value>,
    },
    Enum {
        adt: AdtId,
        tag: i64,
        payload: Vec<Value>,
    },
    Array(Vec<Value>),
    /// A non-owning reference into a live frame's register
    Ref(FrameRef),
    /// A register allocated but not yet written on the executed path
    Undefined,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Struct { .. } => "struct",
            Value::Enum { .. } => "enum",
            Value::Array(_) => "array",
            Value::Ref(_) => "ref",
            Value::Undefined => "undefined",
        }
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Char(value) => write!(f, "{value:?}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::Struct { fields, .. } => {
                write!(f, "{{ ")?;
                for (index, field) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, " }}")
            }
            Value::Enum { tag, payload, .. } => {
                write!(f, "#{tag}(")?;
                for (index, field) in payload.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
            Value::Array(elements) => {
                write!(f, "[")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Ref(reference) => write!(f, "&<frame {}>", reference.frame.slot),
            Value::Undefined => write!(f, "<undefined>"),
        }
    }
}

/// Points at a register in a (possibly no longer live) frame. The handle's
/// generation is compared against the slot's current generation on every
/// dereference; a mismatch means the frame was torn down and the access
/// traps instead of reading reused memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub frame: FrameHandle,
    pub register: RegisterId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    pub slot: usize,
    pub generation: u64,
}
