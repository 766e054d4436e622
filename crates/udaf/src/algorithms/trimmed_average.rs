//! Trimmed average over a finished histogram (`fp_avg`).
//!
//! Entries are consumed heaviest first until `ceil(total * percent / 100)`
//! observations have been taken; the last entry taken may be consumed only
//! in part. The result is the value-weighted mean of what was taken. Ties
//! on count are broken by ascending key so the output is reproducible.

use std::sync::Arc;

use tracing::debug;

use udaf_types::datum::{Datum, TypeDesc};
use udaf_types::error::{Result, UdafError};

use crate::algorithms::frequency_map::{decode_entries, FrequencyMap};

/// Compute the trimmed average of `(key, count)` entries keeping
/// `percent` percent of the mass.
pub fn trimmed_average(
    entries: impl IntoIterator<Item = (f64, u64)>,
    percent: u32,
) -> Result<f64> {
    let mut entries: Vec<(f64, u64)> = entries.into_iter().collect();
    match entries.len() {
        0 => {
            return Err(UdafError::EmptyInput(
                "trimmed average of an empty histogram".to_string(),
            ))
        }
        // All mass sits on one value.
        1 => return Ok(entries[0].0),
        _ => {}
    }

    let total: u128 = entries.iter().map(|&(_, c)| c as u128).sum();
    if total == 0 {
        return Err(UdafError::EmptyInput(
            "trimmed average of a histogram whose counts are all zero".to_string(),
        ));
    }
    let threshold = (total * percent as u128).div_ceil(100);

    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.total_cmp(&b.0)));

    let mut remaining = threshold;
    let mut acc = 0.0f64;
    for (key, count) in entries {
        let count = count as u128;
        if count <= remaining {
            acc += count as f64 * key;
            remaining -= count;
        } else {
            acc += remaining as f64 * key;
            break;
        }
    }

    Ok(acc / threshold as f64)
}

/// Scalar function taking one `map<numeric,int>` and returning a double.
#[derive(Debug, Default)]
pub struct TrimmedAverageFunction {
    initialized: bool,
}

impl TrimmedAverageFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, args: &[TypeDesc]) -> Result<TypeDesc> {
        if args.len() != 1 {
            return Err(UdafError::argument_count("exactly one argument", args.len()));
        }
        match &args[0] {
            TypeDesc::Map(k, v) if k.is_numeric() && **v == TypeDesc::Int => {}
            TypeDesc::Map(_, _) => {
                return Err(UdafError::argument_type(
                    0,
                    format!("the map must be of type map<double,int> but {} is passed", args[0]),
                ))
            }
            other => {
                return Err(UdafError::argument_type(
                    0,
                    format!("only map arguments are accepted but {} is passed", other),
                ))
            }
        }
        debug!(input = %args[0], "fp_avg initialized");
        self.initialized = true;
        Ok(TypeDesc::Double)
    }

    /// Evaluate on one histogram value. A null argument yields null.
    pub fn evaluate(&self, arg: &Datum) -> Result<Datum> {
        if !self.initialized {
            return Err(UdafError::Uninitialized("fp_avg"));
        }
        if arg.is_null() {
            return Ok(Datum::Null);
        }
        let entries = decode_entries(arg).map_err(|msg| UdafError::argument_type(0, msg))?;
        let mut map = FrequencyMap::new();
        for (k, v) in entries {
            map.add_count(k, v)
                .map_err(|e| UdafError::argument_type(0, e.to_string()))?;
        }
        map.trimmed_average().map(Datum::Double)
    }
}

/// Convenience for hosts holding a histogram as plain pairs.
pub fn histogram_datum(entries: &[(f64, i64)]) -> Datum {
    let pairs: Vec<(Datum, Datum)> = entries
        .iter()
        .map(|&(k, v)| (Datum::Double(k), Datum::Int(v)))
        .collect();
    Datum::Map(Arc::from(pairs))
}
