//! In-process driver that plays the host's part.
//!
//! Each partition is folded by its own evaluator in `RawToPartial`. While
//! more partials remain than the configured fan-in, they are combined in
//! `PartialToPartial` stages. A final `PartialToFinal` instance merges what
//! is left. Partials travel either as values or as encoded bytes.

use tracing::debug;

use udaf_types::datum::{Datum, TypeDesc};
use udaf_types::error::Result;
use udaf_types::lazy::LazyDatum;

use crate::protocol::{AggregateEvaluator, PartialInput, Phase};

/// How partials move between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Hand the decoded value to the next stage.
    Structured,
    /// Encode to bytes and hand over a lazy view.
    Encoded,
}

/// Runs an evaluator over pre-partitioned rows.
pub struct LocalReducer<F> {
    factory: F,
    args: Vec<TypeDesc>,
    fan_in: usize,
    transport: Transport,
}

impl<F, E> LocalReducer<F>
where
    F: Fn() -> E,
    E: AggregateEvaluator,
{
    /// `factory` creates a fresh evaluator for every task; `args` are the
    /// raw column shapes.
    pub fn new(factory: F, args: Vec<TypeDesc>) -> Self {
        LocalReducer {
            factory,
            args,
            fan_in: usize::MAX,
            transport: Transport::Structured,
        }
    }

    /// Combine partials in groups of at most `fan_in` before the final
    /// stage. Values below 2 are raised to 2.
    pub fn with_fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in.max(2);
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Single-stage aggregation over all rows.
    pub fn run_single<'a>(&self, rows: impl IntoIterator<Item = &'a [Datum]>) -> Result<Datum> {
        let mut evaluator = (self.factory)();
        evaluator.initialize(Phase::RawToFinal, &self.args)?;
        let mut buffer = evaluator.new_buffer();
        for row in rows {
            evaluator.accumulate(&mut buffer, row)?;
        }
        evaluator.finalize(&mut buffer)
    }

    /// Aggregate `partitions`, one raw task per partition.
    pub fn run(&self, partitions: &[Vec<Vec<Datum>>]) -> Result<Datum> {
        let mut partial_shape = None;
        let mut partials = Vec::with_capacity(partitions.len());
        for (i, partition) in partitions.iter().enumerate() {
            let mut evaluator = (self.factory)();
            let shape = evaluator.initialize(Phase::RawToPartial, &self.args)?;
            let mut buffer = evaluator.new_buffer();
            for row in partition {
                evaluator.accumulate(&mut buffer, row)?;
            }
            partials.push(self.ship(evaluator.extract_partial(&buffer)?)?);
            debug!(partition = i, rows = partition.len(), "raw stage done");
            partial_shape = Some(shape);
        }
        let partial_shape = match partial_shape {
            Some(shape) => shape,
            // No partitions: nothing to merge, behave like an empty input.
            None => return self.run_single(std::iter::empty()),
        };
        let merge_args = [partial_shape];

        let mut stage = 0;
        while partials.len() > self.fan_in {
            stage += 1;
            let mut evaluator = (self.factory)();
            evaluator.initialize(Phase::PartialToPartial, &merge_args)?;
            // One buffer per combine stage, reset between groups.
            let mut buffer = evaluator.new_buffer();
            let mut next = Vec::with_capacity(partials.len().div_ceil(self.fan_in));
            for group in partials.chunks(self.fan_in) {
                evaluator.reset(&mut buffer);
                for partial in group {
                    evaluator.merge(&mut buffer, Some(partial))?;
                }
                next.push(self.ship(evaluator.extract_partial(&buffer)?)?);
            }
            debug!(stage, inputs = partials.len(), outputs = next.len(), "combine stage done");
            partials = next;
        }

        let mut evaluator = (self.factory)();
        evaluator.initialize(Phase::PartialToFinal, &merge_args)?;
        let mut buffer = evaluator.new_buffer();
        for partial in &partials {
            evaluator.merge(&mut buffer, Some(partial))?;
        }
        debug!(inputs = partials.len(), "final stage done");
        evaluator.finalize(&mut buffer)
    }

    fn ship(&self, partial: Datum) -> Result<PartialInput> {
        match self.transport {
            Transport::Structured => Ok(PartialInput::Structured(partial)),
            Transport::Encoded => Ok(PartialInput::Encoded(LazyDatum::encode(&partial)?)),
        }
    }
}
