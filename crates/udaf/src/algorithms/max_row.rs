//! Max-row aggregator (`maxrow`).
//!
//! Keeps the whole row whose first column is largest. Raw phases take N
//! loose columns and name them `col0..colN-1`; merge phases take the struct
//! produced by a raw phase. A row replaces the current one only when its key
//! is strictly greater, so among equal keys the first row adopted wins.
//! A null key ranks below every value: such a row is kept only until any
//! non-null key arrives.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, trace};

use udaf_types::datum::{Datum, Field, TypeDesc};
use udaf_types::error::{Result, UdafError};
use udaf_types::ordering::{ordering_for, KeyOrdering};

use crate::protocol::{AggregateEvaluator, PartialInput, Phase};

/// Input layout, fixed at `initialize`.
#[derive(Debug, Clone, PartialEq)]
enum RowShape {
    /// Loose columns; names are synthesized.
    Raw { fields: Vec<Field> },
    /// One struct argument carrying an earlier partial.
    Merged { fields: Vec<Field> },
}

impl RowShape {
    fn fields(&self) -> &[Field] {
        match self {
            RowShape::Raw { fields } | RowShape::Merged { fields } => fields,
        }
    }

    fn arity(&self) -> usize {
        self.fields().len()
    }

    fn output_type(&self) -> TypeDesc {
        TypeDesc::Struct(self.fields().to_vec())
    }
}

#[derive(Debug)]
struct Resolved {
    shape: RowShape,
    key_order: Box<dyn KeyOrdering>,
}

/// Current best row. Empty means no row has been adopted yet; arity is at
/// least one once initialized, so an adopted row is never empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxRowBuffer {
    row: Vec<Datum>,
}

impl MaxRowBuffer {
    pub fn row(&self) -> Option<&[Datum]> {
        if self.row.is_empty() {
            None
        } else {
            Some(self.row.as_slice())
        }
    }

    /// Replace the held row with detached copies of `values`.
    fn adopt(&mut self, values: &[Datum]) {
        self.row.clear();
        self.row.extend(values.iter().map(Datum::detach));
    }
}

/// Evaluator tracking the row with the maximum ranking key.
#[derive(Debug, Default)]
pub struct MaxRowAggregator {
    resolved: Option<Resolved>,
}

impl MaxRowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolved(&self) -> Result<&Resolved> {
        self.resolved.as_ref().ok_or(UdafError::Uninitialized("maxrow"))
    }

    /// Shared path of `accumulate` and `merge`.
    fn consider(&self, resolved: &Resolved, buffer: &mut MaxRowBuffer, values: &[Datum]) {
        let key = &values[0];
        let is_max = match buffer.row() {
            None => true,
            Some(current) => resolved.key_order.compare(key, &current[0]) == Ordering::Greater,
        };
        if is_max {
            trace!(key = %key, "maxrow adopted new row");
            buffer.adopt(values);
        }
    }
}

fn raw_shape(args: &[TypeDesc]) -> Result<RowShape> {
    if args.is_empty() {
        return Err(UdafError::argument_count("at least one argument", 0));
    }
    let fields = args
        .iter()
        .enumerate()
        .map(|(i, ty)| Field::new(format!("col{}", i), ty.clone()))
        .collect();
    Ok(RowShape::Raw { fields })
}

fn merged_shape(args: &[TypeDesc]) -> Result<RowShape> {
    if args.len() != 1 {
        return Err(UdafError::argument_count("exactly one struct argument", args.len()));
    }
    match &args[0] {
        TypeDesc::Struct(fields) if !fields.is_empty() => Ok(RowShape::Merged {
            fields: fields.clone(),
        }),
        other => Err(UdafError::argument_type(
            0,
            format!("expected partial of type struct<...> but {} is passed", other),
        )),
    }
}

impl AggregateEvaluator for MaxRowAggregator {
    type Buffer = MaxRowBuffer;

    fn initialize(&mut self, phase: Phase, args: &[TypeDesc]) -> Result<TypeDesc> {
        let shape = if phase.consumes_raw() {
            raw_shape(args)?
        } else {
            merged_shape(args)?
        };
        let key_type = &shape.fields()[0].ty;
        if key_type.contains_map() {
            return Err(UdafError::UnsupportedKeyType(format!(
                "cannot support comparison of map<> type or complex type containing map<>: {}",
                key_type
            )));
        }
        let key_order = ordering_for(key_type)?;
        let output = shape.output_type();
        debug!(%phase, output = %output, "maxrow initialized");
        self.resolved = Some(Resolved { shape, key_order });
        Ok(output)
    }

    fn new_buffer(&self) -> MaxRowBuffer {
        MaxRowBuffer::default()
    }

    fn reset(&self, buffer: &mut MaxRowBuffer) {
        buffer.row.clear();
    }

    fn accumulate(&self, buffer: &mut MaxRowBuffer, row: &[Datum]) -> Result<()> {
        let resolved = self.resolved()?;
        let values: &[Datum] = match &resolved.shape {
            RowShape::Raw { .. } => row,
            // A merge-phase row is the single struct column itself.
            RowShape::Merged { .. } => match row {
                [Datum::Null] => return Ok(()),
                [Datum::Struct(fields)] => &fields[..],
                _ => {
                    return Err(UdafError::argument_type(
                        0,
                        "expected a single struct value".to_string(),
                    ))
                }
            },
        };
        if values.len() != resolved.shape.arity() {
            return Err(UdafError::argument_count(
                resolved.shape.arity().to_string(),
                values.len(),
            ));
        }
        self.consider(resolved, buffer, values);
        Ok(())
    }

    fn extract_partial(&self, buffer: &MaxRowBuffer) -> Result<Datum> {
        Ok(match buffer.row() {
            Some(row) => Datum::Struct(row.iter().map(Datum::detach).collect()),
            None => Datum::Null,
        })
    }

    fn merge(&self, buffer: &mut MaxRowBuffer, partial: Option<&PartialInput>) -> Result<()> {
        let resolved = self.resolved()?;
        let partial = match partial {
            Some(p) if !p.is_null() => p,
            _ => return Ok(()),
        };
        let fields: &[Datum] = match partial {
            PartialInput::Structured(Datum::Struct(fields)) => &fields[..],
            PartialInput::Structured(other) => {
                return Err(UdafError::InvalidPartialRepresentation(format!(
                    "expected struct partial, found {}",
                    other.kind()
                )))
            }
            PartialInput::Encoded(view) => view.fields().map_err(|e| match e {
                UdafError::InvalidPartialRepresentation(_) => e,
                other => {
                    UdafError::InvalidPartialRepresentation(format!("undecodable partial: {}", other))
                }
            })?,
        };
        if fields.len() != resolved.shape.arity() {
            return Err(UdafError::InvalidPartialRepresentation(format!(
                "partial has {} fields, expected {}",
                fields.len(),
                resolved.shape.arity()
            )));
        }
        self.consider(resolved, buffer, fields);
        Ok(())
    }

    fn finalize(&self, buffer: &mut MaxRowBuffer) -> Result<Datum> {
        if buffer.row().is_none() {
            return Ok(Datum::Null);
        }
        Ok(Datum::Struct(Arc::from(std::mem::take(&mut buffer.row))))
    }
}
