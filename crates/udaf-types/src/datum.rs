use std::sync::Arc;

use crate::error::{Result, UdafError};

/// Type tag for a [`Datum`]. The numeric values are part of the binary
/// partial encoding and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DatumKind {
    Int = 0,
    Double = 1,
    Text = 2,
    Bool = 3,
    Array = 4,
    Struct = 5,
    Map = 6,
    Null = 7,
}

impl TryFrom<u8> for DatumKind {
    type Error = UdafError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Int),
            1 => Ok(Self::Double),
            2 => Ok(Self::Text),
            3 => Ok(Self::Bool),
            4 => Ok(Self::Array),
            5 => Ok(Self::Struct),
            6 => Ok(Self::Map),
            7 => Ok(Self::Null),
            _ => Err(UdafError::Format(format!("Unknown datum kind: {}", value))),
        }
    }
}

impl std::fmt::Display for DatumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Double => write!(f, "double"),
            Self::Text => write!(f, "string"),
            Self::Bool => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Struct => write!(f, "struct"),
            Self::Map => write!(f, "map"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A value the host can hand to an evaluator or carry between tasks.
///
/// Composite payloads are reference counted, so `clone()` is shallow. Use
/// [`Datum::detach`] when a value must outlive the buffer it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Int(i64),
    Double(f64),
    Text(Arc<str>),
    Bool(bool),
    Array(Arc<[Datum]>),
    /// Positional fields; names live in the matching [`TypeDesc::Struct`].
    Struct(Arc<[Datum]>),
    Map(Arc<[(Datum, Datum)]>),
    Null,
}

impl Datum {
    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::Int(_) => DatumKind::Int,
            Datum::Double(_) => DatumKind::Double,
            Datum::Text(_) => DatumKind::Text,
            Datum::Bool(_) => DatumKind::Bool,
            Datum::Array(_) => DatumKind::Array,
            Datum::Struct(_) => DatumKind::Struct,
            Datum::Map(_) => DatumKind::Map,
            Datum::Null => DatumKind::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric value widened to `f64`, or `None` for non-numeric data.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(i) => Some(*i as f64),
            Datum::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Deep copy that shares no storage with `self`.
    ///
    /// Evaluators call this at the moment they retain a value the caller
    /// still owns; the caller is free to reuse its row afterwards.
    pub fn detach(&self) -> Datum {
        match self {
            Datum::Int(v) => Datum::Int(*v),
            Datum::Double(v) => Datum::Double(*v),
            Datum::Bool(v) => Datum::Bool(*v),
            Datum::Null => Datum::Null,
            Datum::Text(s) => Datum::Text(Arc::from(s.as_ref())),
            Datum::Array(items) => Datum::Array(items.iter().map(Datum::detach).collect()),
            Datum::Struct(fields) => Datum::Struct(fields.iter().map(Datum::detach).collect()),
            Datum::Map(pairs) => Datum::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (k.detach(), v.detach()))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Double(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(Arc::from(v))
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl std::fmt::Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Double(v) => write!(f, "{}", v),
            Datum::Text(v) => write!(f, "{}", v),
            Datum::Bool(v) => write!(f, "{}", v),
            Datum::Array(items) | Datum::Struct(items) => {
                write!(f, "[")?;
                for (i, x) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
            Datum::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Datum::Null => write!(f, "NULL"),
        }
    }
}

/// Named field of a struct shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Field {
            name: name.into(),
            ty,
        }
    }
}

/// Shape of an argument or result, as negotiated at `initialize` time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Bool,
    Int,
    Double,
    Text,
    Array(Box<TypeDesc>),
    Struct(Vec<Field>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
}

impl TypeDesc {
    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(key), Box::new(value))
    }

    pub fn array(elem: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(elem))
    }

    /// `map<double,int>`, the histogram shape.
    pub fn frequency_map() -> Self {
        Self::map(TypeDesc::Double, TypeDesc::Int)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeDesc::Int | TypeDesc::Double)
    }

    /// True if this shape is a map or nests one anywhere inside it.
    pub fn contains_map(&self) -> bool {
        match self {
            TypeDesc::Map(_, _) => true,
            TypeDesc::Array(elem) => elem.contains_map(),
            TypeDesc::Struct(fields) => fields.iter().any(|f| f.ty.contains_map()),
            TypeDesc::Bool | TypeDesc::Int | TypeDesc::Double | TypeDesc::Text => false,
        }
    }
}

impl std::fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "boolean"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Double => write!(f, "double"),
            TypeDesc::Text => write!(f, "string"),
            TypeDesc::Array(elem) => write!(f, "array<{}>", elem),
            TypeDesc::Map(k, v) => write!(f, "map<{},{}>", k, v),
            TypeDesc::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", field.name, field.ty)?;
                }
                write!(f, ">")
            }
        }
    }
}
