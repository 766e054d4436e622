//! Total-order capability over typed values.
//!
//! An ordering is resolved once from a [`TypeDesc`] and then applied per
//! row. Map shapes have no total order and are rejected at resolution
//! time, as is any composite that nests a map.

use std::cmp::Ordering;

use crate::datum::{Datum, TypeDesc};
use crate::error::{Result, UdafError};

/// Comparison over values of one declared shape.
///
/// `Null` sorts below every non-null value. Values whose runtime kind does
/// not match the declared shape rank by kind tag so the order stays total.
pub trait KeyOrdering: Send + Sync + std::fmt::Debug {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering;
}

/// Resolve the ordering for values of `ty`.
pub fn ordering_for(ty: &TypeDesc) -> Result<Box<dyn KeyOrdering>> {
    match ty {
        TypeDesc::Int | TypeDesc::Double => Ok(Box::new(NumericOrdering)),
        TypeDesc::Text => Ok(Box::new(TextOrdering)),
        TypeDesc::Bool => Ok(Box::new(BoolOrdering)),
        TypeDesc::Array(elem) => Ok(Box::new(ArrayOrdering {
            elem: ordering_for(elem)?,
        })),
        TypeDesc::Struct(fields) => {
            let fields = fields
                .iter()
                .map(|f| ordering_for(&f.ty))
                .collect::<Result<Vec<_>>>()?;
            Ok(Box::new(StructOrdering { fields }))
        }
        TypeDesc::Map(_, _) => Err(UdafError::UnsupportedKeyType(format!(
            "cannot compare values of type {}",
            ty
        ))),
    }
}

/// Shared null and kind-mismatch handling. Returns `None` when both sides
/// are non-null and of the same kind, i.e. the caller must decide.
fn compare_envelope(a: &Datum, b: &Datum) -> Option<Ordering> {
    match (a, b) {
        (Datum::Null, Datum::Null) => Some(Ordering::Equal),
        (Datum::Null, _) => Some(Ordering::Less),
        (_, Datum::Null) => Some(Ordering::Greater),
        _ if a.kind() == b.kind() => None,
        _ => Some((a.kind() as u8).cmp(&(b.kind() as u8))),
    }
}

#[derive(Debug)]
struct NumericOrdering;

impl KeyOrdering for NumericOrdering {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a, b) {
            (Datum::Int(x), Datum::Int(y)) => x.cmp(y),
            (Datum::Double(x), Datum::Double(y)) => x.total_cmp(y),
            // Mixed numeric kinds compare by value.
            (Datum::Int(x), Datum::Double(y)) => (*x as f64).total_cmp(y),
            (Datum::Double(x), Datum::Int(y)) => x.total_cmp(&(*y as f64)),
            _ => compare_envelope(a, b).unwrap_or(Ordering::Equal),
        }
    }
}

#[derive(Debug)]
struct TextOrdering;

impl KeyOrdering for TextOrdering {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a, b) {
            (Datum::Text(x), Datum::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
            _ => compare_envelope(a, b).unwrap_or(Ordering::Equal),
        }
    }
}

#[derive(Debug)]
struct BoolOrdering;

impl KeyOrdering for BoolOrdering {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a, b) {
            (Datum::Bool(x), Datum::Bool(y)) => x.cmp(y),
            _ => compare_envelope(a, b).unwrap_or(Ordering::Equal),
        }
    }
}

#[derive(Debug)]
struct ArrayOrdering {
    elem: Box<dyn KeyOrdering>,
}

impl KeyOrdering for ArrayOrdering {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a, b) {
            (Datum::Array(x), Datum::Array(y)) => {
                for (l, r) in x.iter().zip(y.iter()) {
                    let cmp = self.elem.compare(l, r);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => compare_envelope(a, b).unwrap_or(Ordering::Equal),
        }
    }
}

#[derive(Debug)]
struct StructOrdering {
    fields: Vec<Box<dyn KeyOrdering>>,
}

impl KeyOrdering for StructOrdering {
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a, b) {
            (Datum::Struct(x), Datum::Struct(y)) => {
                for ((l, r), ord) in x.iter().zip(y.iter()).zip(self.fields.iter()) {
                    let cmp = ord.compare(l, r);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => compare_envelope(a, b).unwrap_or(Ordering::Equal),
        }
    }
}
