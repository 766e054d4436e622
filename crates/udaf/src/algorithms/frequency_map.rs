//! Histogram aggregator (`map_count`): numeric value → occurrence count.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use udaf_types::datum::{Datum, TypeDesc};
use udaf_types::error::{Result, UdafError};

use crate::algorithms::trimmed_average::trimmed_average;
use crate::protocol::{AggregateEvaluator, PartialInput, Phase};

/// `f64` usable as a map key. Equality and hashing use the bit pattern,
/// ordering uses the IEEE total order; the two agree.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatKey {}

impl std::hash::Hash for FloatKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Largest count a histogram entry may hold; counts travel as `int`.
const MAX_COUNT: u64 = i64::MAX as u64;

/// Occurrence counts keyed by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyMap {
    counts: HashMap<FloatKey, u64>,
}

impl FrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `value`.
    pub fn insert(&mut self, value: f64) -> Result<()> {
        self.add_count(value, 1)
    }

    /// Add `count` occurrences of `value`. A total that no longer fits an
    /// `int` count is rejected and leaves the entry unchanged.
    pub fn add_count(&mut self, value: f64, count: u64) -> Result<()> {
        let current = self.get(value);
        match current.checked_add(count) {
            Some(sum) if sum <= MAX_COUNT => {
                self.counts.insert(FloatKey(value), sum);
                Ok(())
            }
            _ => Err(UdafError::InvalidPartialRepresentation(format!(
                "count for key {} overflows: {} + {}",
                value, current, count
            ))),
        }
    }

    /// Add every count of `other` into `self`. Additive, so merging a map
    /// into itself doubles it.
    pub fn merge_from(&mut self, other: &FrequencyMap) -> Result<()> {
        for (k, &v) in &other.counts {
            self.add_count(k.0, v)?;
        }
        Ok(())
    }

    pub fn get(&self, value: f64) -> u64 {
        self.counts.get(&FloatKey(value)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of observations folded in.
    pub fn total(&self) -> u128 {
        self.counts.values().map(|&c| c as u128).sum()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Entries in ascending key order.
    pub fn entries(&self) -> Vec<(f64, u64)> {
        let mut entries: Vec<(FloatKey, u64)> = self.counts.iter().map(|(k, &v)| (*k, v)).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries.into_iter().map(|(k, v)| (k.0, v)).collect()
    }

    /// `map<double,int>` value with entries in ascending key order.
    pub fn to_datum(&self) -> Result<Datum> {
        let pairs = self
            .entries()
            .into_iter()
            .map(|(k, v)| {
                let count = i64::try_from(v).map_err(|_| {
                    UdafError::InvalidPartialRepresentation(format!(
                        "count {} for key {} does not fit an int",
                        v, k
                    ))
                })?;
                Ok((Datum::Double(k), Datum::Int(count)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Datum::Map(Arc::from(pairs)))
    }

    /// Build a map from a `map<numeric,int>` value.
    pub fn from_datum(value: &Datum) -> Result<Self> {
        let mut map = FrequencyMap::new();
        map.merge_datum(value)?;
        Ok(map)
    }

    /// Add the counts of a `map<numeric,int>` value.
    pub fn merge_datum(&mut self, value: &Datum) -> Result<()> {
        let entries = decode_entries(value).map_err(UdafError::InvalidPartialRepresentation)?;
        for (k, v) in entries {
            self.add_count(k, v)?;
        }
        Ok(())
    }

    /// Weighted average over the heaviest share of the distribution.
    pub fn trimmed_average(&self) -> Result<f64> {
        trimmed_average(self.entries(), udaf_config::get_trim_percent())
    }
}

/// Decode `(key, count)` pairs from a histogram-shaped value. Errors are
/// plain messages so callers can pick the error kind that fits them.
pub(crate) fn decode_entries(value: &Datum) -> std::result::Result<Vec<(f64, u64)>, String> {
    let pairs = match value {
        Datum::Map(pairs) => pairs,
        other => return Err(format!("expected map<double,int>, found {}", other.kind())),
    };
    pairs
        .iter()
        .map(|(k, v)| {
            let key = k
                .as_f64()
                .ok_or_else(|| format!("histogram key must be numeric, found {}", k.kind()))?;
            let count = match v {
                Datum::Int(c) if *c >= 0 => *c as u64,
                Datum::Int(c) => return Err(format!("negative count {} for key {}", c, key)),
                other => {
                    return Err(format!(
                        "histogram count must be int, found {}",
                        other.kind()
                    ))
                }
            };
            Ok((key, count))
        })
        .collect()
}

/// Evaluator that builds a [`FrequencyMap`] over one numeric column.
#[derive(Debug, Default)]
pub struct FrequencyMapAggregator {
    phase: Option<Phase>,
}

impl FrequencyMapAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AggregateEvaluator for FrequencyMapAggregator {
    type Buffer = FrequencyMap;

    fn initialize(&mut self, phase: Phase, args: &[TypeDesc]) -> Result<TypeDesc> {
        if args.len() != 1 {
            return Err(UdafError::argument_count("exactly one argument", args.len()));
        }
        let arg = &args[0];
        if phase.consumes_raw() {
            if !arg.is_numeric() {
                return Err(UdafError::argument_type(
                    0,
                    format!("only numeric arguments are accepted but {} is passed", arg),
                ));
            }
        } else {
            let partial_ok = match arg {
                TypeDesc::Map(k, v) => k.is_numeric() && **v == TypeDesc::Int,
                _ => false,
            };
            if !partial_ok {
                return Err(UdafError::argument_type(
                    0,
                    format!("expected partial of type map<double,int> but {} is passed", arg),
                ));
            }
        }
        debug!(%phase, input = %arg, "map_count initialized");
        self.phase = Some(phase);
        Ok(TypeDesc::frequency_map())
    }

    fn new_buffer(&self) -> FrequencyMap {
        FrequencyMap::new()
    }

    fn reset(&self, buffer: &mut FrequencyMap) {
        buffer.clear();
    }

    fn accumulate(&self, buffer: &mut FrequencyMap, row: &[Datum]) -> Result<()> {
        if self.phase.is_none() {
            return Err(UdafError::Uninitialized("map_count"));
        }
        let value = match row {
            [value] => value,
            _ => return Err(UdafError::argument_count("exactly one argument", row.len())),
        };
        if value.is_null() {
            return Ok(());
        }
        let v = value.as_f64().ok_or_else(|| {
            UdafError::argument_type(0, format!("expected numeric value, found {}", value.kind()))
        })?;
        buffer.insert(v)
    }

    fn extract_partial(&self, buffer: &FrequencyMap) -> Result<Datum> {
        buffer.to_datum()
    }

    fn merge(&self, buffer: &mut FrequencyMap, partial: Option<&PartialInput>) -> Result<()> {
        if self.phase.is_none() {
            return Err(UdafError::Uninitialized("map_count"));
        }
        let partial = match partial {
            Some(p) if !p.is_null() => p,
            _ => return Ok(()),
        };
        let value = partial.value()?;
        buffer.merge_datum(value)?;
        trace!(keys = buffer.len(), "map_count merged partial");
        Ok(())
    }

    fn finalize(&self, buffer: &mut FrequencyMap) -> Result<Datum> {
        buffer.to_datum()
    }
}
