//! Aggregator: restore page order from chunk reports that arrive unordered.
//!
//! Results are slotted by index as they arrive; nothing is ordered until
//! [`Aggregator::finish`], which walks the slots in ascending index order.
//! Every task yields exactly one entry: an index that never reported is
//! synthesised as a failure and a duplicate report is dropped with a warning,
//! so `successes + failures == total` always holds.

use crate::error::ItemError;
use crate::output::{ChunkReport, FailedImage, ImageTask, TransformResult, TransformedImage};
use std::path::PathBuf;
use tracing::warn;

/// Index-keyed accumulator for one run.
#[derive(Debug)]
pub struct Aggregator {
    paths: Vec<PathBuf>,
    slots: Vec<Option<TransformResult>>,
    reported: usize,
}

/// Ordered outcome of the transform phase.
#[derive(Debug)]
pub struct Aggregated {
    /// Ascending by index.
    pub successes: Vec<TransformedImage>,
    /// Ascending by index.
    pub failures: Vec<FailedImage>,
    pub converted: usize,
    pub passed_through: usize,
}

impl Aggregated {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

impl Aggregator {
    /// `tasks` must carry indices `0..tasks.len()`.
    pub fn new(tasks: &[ImageTask]) -> Self {
        let mut paths = vec![PathBuf::new(); tasks.len()];
        for t in tasks {
            if let Some(slot) = paths.get_mut(t.index) {
                *slot = t.path.clone();
            }
        }
        Self {
            slots: (0..tasks.len()).map(|_| None).collect(),
            paths,
            reported: 0,
        }
    }

    /// Number of distinct tasks reported so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Record one chunk's results. Returns the failures it contained.
    pub fn push(&mut self, report: ChunkReport) -> Vec<&FailedImage> {
        let mut fresh = Vec::new();
        for result in report {
            let index = result.index();
            match self.slots.get_mut(index) {
                None => warn!("Dropping result for unknown index {}", index),
                Some(slot) if slot.is_some() => warn!(
                    "Dropping duplicate result for index {} ({})",
                    index,
                    result.path().display()
                ),
                Some(slot) => {
                    *slot = Some(result);
                    self.reported += 1;
                    fresh.push(index);
                }
            }
        }
        fresh
            .into_iter()
            .filter_map(|i| match &self.slots[i] {
                Some(TransformResult::Failure(f)) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Partition into ordered successes and failures.
    pub fn finish(self) -> Aggregated {
        let mut out = Aggregated {
            successes: Vec::with_capacity(self.reported),
            failures: Vec::new(),
            converted: 0,
            passed_through: 0,
        };
        for (index, (slot, path)) in self.slots.into_iter().zip(self.paths).enumerate() {
            match slot {
                Some(TransformResult::Success(t)) => {
                    if t.was_converted {
                        out.converted += 1;
                    } else {
                        out.passed_through += 1;
                    }
                    out.successes.push(t);
                }
                Some(TransformResult::Failure(f)) => out.failures.push(f),
                None => {
                    warn!("No result reported for index {} ({})", index, path.display());
                    out.failures.push(FailedImage::new(
                        index,
                        ItemError::WorkerFailed {
                            path,
                            detail: "no result reported".into(),
                        },
                    ));
                }
            }
        }
        out
    }
}
