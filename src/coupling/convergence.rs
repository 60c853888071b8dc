//! Convergence measures for implicit coupling.
//!
//! Only the convergence controller (the second participant of the scheme)
//! evaluates measures; its verdict travels to the partner with its data.

use hashbrown::HashMap;

use crate::coupling::config::MeasureKind;
use crate::data::store::DataStore;
use crate::topology::ids::DataId;

#[derive(Clone, Debug)]
struct Measure {
    data: DataId,
    kind: MeasureKind,
    /// Norm of the first change in the current window.
    first_change: Option<f64>,
}

/// Evaluates the configured measures against successive iterates.
#[derive(Clone, Debug)]
pub struct ConvergenceTracker {
    measures: Vec<Measure>,
    previous: HashMap<DataId, Vec<f64>>,
    min_iterations: u32,
    max_iterations: u32,
}

fn l2(values: impl Iterator<Item = f64>) -> f64 {
    values.map(|x| x * x).sum::<f64>().sqrt()
}

impl ConvergenceTracker {
    pub fn new(measures: Vec<(DataId, MeasureKind)>, min_iterations: u32, max_iterations: u32) -> Self {
        Self {
            measures: measures
                .into_iter()
                .map(|(data, kind)| Measure {
                    data,
                    kind,
                    first_change: None,
                })
                .collect(),
            previous: HashMap::new(),
            min_iterations,
            max_iterations,
        }
    }

    /// Records the current values as the reference for the next evaluation.
    pub fn snapshot(&mut self, store: &DataStore) {
        for m in &self.measures {
            if let Ok(field) = store.field(m.data) {
                self.previous.insert(m.data, field.values().to_vec());
            }
        }
    }

    /// Forgets per-window state once a window has converged.
    pub fn start_window(&mut self) {
        for m in &mut self.measures {
            m.first_change = None;
        }
    }

    /// Verdict for the iteration that just finished.
    ///
    /// A window converges when every measure is met and at least
    /// `min_iterations` were performed, or unconditionally once
    /// `max_iterations` is reached. Without measures only the latter applies.
    pub fn evaluate(&mut self, iteration: u32, store: &DataStore) -> bool {
        let mut all_met = !self.measures.is_empty();
        for m in &mut self.measures {
            let Ok(field) = store.field(m.data) else {
                all_met = false;
                continue;
            };
            let current = field.values();
            let change = match self.previous.get(&m.data) {
                Some(old) if old.len() == current.len() => {
                    l2(current.iter().zip(old).map(|(new, old)| new - old))
                }
                _ => l2(current.iter().copied()),
            };
            let met = match m.kind {
                MeasureKind::Absolute { limit } => change <= limit,
                MeasureKind::Relative { limit } => change <= limit * l2(current.iter().copied()),
                MeasureKind::ResidualRelative { limit } => {
                    let first = *m.first_change.get_or_insert(change);
                    change <= limit * first
                }
            };
            log::debug!(
                "convergence measure on {}: change {change:.3e}, {:?} -> {}",
                m.data,
                m.kind,
                if met { "met" } else { "not met" }
            );
            all_met &= met;
            self.previous.insert(m.data, current.to_vec());
        }
        (all_met && iteration >= self.min_iterations) || iteration >= self.max_iterations
    }
}
