//! Partial-aggregation lifecycle shared by every evaluator.
//!
//! A host drives one evaluator instance per task and phase. Raw phases see
//! decoded rows through `accumulate`; merge phases see snapshots produced
//! by `extract_partial` on other instances through `merge`. Because `merge`
//! is associative and commutative, the host may arrange partials in any
//! tree and still get the result of a single sequential pass.

use udaf_types::datum::{Datum, DatumKind, TypeDesc};
use udaf_types::error::{Result, UdafError};
use udaf_types::lazy::LazyDatum;

/// Execution phase of one evaluator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Raw rows in, partial out (map side).
    RawToPartial,
    /// Partials in, partial out (combiner).
    PartialToPartial,
    /// Partials in, final value out (reducer).
    PartialToFinal,
    /// Raw rows in, final value out (single stage).
    RawToFinal,
}

impl Phase {
    /// True when inputs arrive as raw rows rather than partials.
    pub fn consumes_raw(self) -> bool {
        matches!(self, Phase::RawToPartial | Phase::RawToFinal)
    }

    /// True when the phase ends in `finalize` rather than `extract_partial`.
    pub fn produces_final(self) -> bool {
        matches!(self, Phase::PartialToFinal | Phase::RawToFinal)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::RawToPartial => write!(f, "raw-to-partial"),
            Phase::PartialToPartial => write!(f, "partial-to-partial"),
            Phase::PartialToFinal => write!(f, "partial-to-final"),
            Phase::RawToFinal => write!(f, "raw-to-final"),
        }
    }
}

/// A partial snapshot as delivered to `merge`.
///
/// Hosts either pass the decoded value through, or keep the bytes they
/// received and let the evaluator decode them. Both carry the same logical
/// value.
#[derive(Debug, Clone)]
pub enum PartialInput {
    Structured(Datum),
    Encoded(LazyDatum),
}

impl PartialInput {
    /// Logical value of the partial. Undecodable bytes are reported as an
    /// invalid partial, not as a codec error.
    pub fn value(&self) -> Result<&Datum> {
        match self {
            PartialInput::Structured(value) => Ok(value),
            PartialInput::Encoded(view) => view.get().map_err(|e| {
                UdafError::InvalidPartialRepresentation(format!("undecodable partial: {}", e))
            }),
        }
    }

    /// True for a null snapshot, which every evaluator treats as a no-op.
    pub fn is_null(&self) -> bool {
        match self {
            PartialInput::Structured(value) => value.is_null(),
            PartialInput::Encoded(view) => matches!(view.kind(), Ok(DatumKind::Null)),
        }
    }
}

impl From<Datum> for PartialInput {
    fn from(value: Datum) -> Self {
        PartialInput::Structured(value)
    }
}

impl From<LazyDatum> for PartialInput {
    fn from(view: LazyDatum) -> Self {
        PartialInput::Encoded(view)
    }
}

/// Trait for mergeable aggregate evaluators.
///
/// Buffers are owned by exactly one task and never shared; evaluators keep
/// only the shape negotiated in `initialize`.
pub trait AggregateEvaluator: Send {
    /// Per-task mutable state.
    type Buffer: Send;

    /// Negotiate shapes for `phase`. Returns the shape this instance will
    /// produce from `extract_partial` or `finalize`.
    fn initialize(&mut self, phase: Phase, args: &[TypeDesc]) -> Result<TypeDesc>;

    /// Allocate an empty buffer.
    fn new_buffer(&self) -> Self::Buffer;

    /// Return `buffer` to its empty state, keeping its allocation.
    fn reset(&self, buffer: &mut Self::Buffer);

    /// Fold one raw row into `buffer`. Null observations are no-ops.
    fn accumulate(&self, buffer: &mut Self::Buffer, row: &[Datum]) -> Result<()>;

    /// Self-contained snapshot of `buffer` for another task.
    fn extract_partial(&self, buffer: &Self::Buffer) -> Result<Datum>;

    /// Fold a snapshot from another instance into `buffer`. `None` and null
    /// snapshots are no-ops.
    fn merge(&self, buffer: &mut Self::Buffer, partial: Option<&PartialInput>) -> Result<()>;

    /// Produce the terminal value. The buffer is reset or dropped afterwards.
    fn finalize(&self, buffer: &mut Self::Buffer) -> Result<Datum>;
}
