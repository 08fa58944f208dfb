//! Delay aggregation over sensitizing conditions and variations.
//!
//! Propagation delay and output transition are reduced independently: the
//! worst-case summary pairs the largest delay with the largest transition,
//! even when the two come from different stimuli. Both reductions are
//! order-independent; the mean sorts its samples before summing so that the
//! result does not depend on completion order down to the last bit.

use cellchar_config::Procedure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How samples of one path are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    /// The maximum.
    WorstCase,
    /// The arithmetic mean.
    Average,
}

impl Aggregation {
    /// The policy of a delay procedure; `None` for searches.
    pub fn of(procedure: Procedure) -> Option<Self> {
        match procedure {
            Procedure::WorstCase => Some(Aggregation::WorstCase),
            Procedure::Average => Some(Aggregation::Average),
            _ => None,
        }
    }

    /// Reduces `values`. Returns `None` when there are none.
    pub fn reduce(self, values: impl IntoIterator<Item = f64>) -> Option<f64> {
        match self {
            Aggregation::WorstCase => values.into_iter().reduce(f64::max),
            Aggregation::Average => {
                let mut values: Vec<f64> = values.into_iter().collect();
                if values.is_empty() {
                    return None;
                }
                values.sort_by(f64::total_cmp);
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregation::WorstCase => "worst-case",
            Aggregation::Average => "average",
        })
    }
}

/// One delay measurement, in library time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySample {
    /// Propagation delay.
    pub delay: f64,
    /// Output transition time.
    pub transition: f64,
}

/// Aggregates `samples` under `policy`, delay and transition independently.
pub fn aggregate(policy: Aggregation, samples: &[DelaySample]) -> Option<DelaySample> {
    Some(DelaySample {
        delay: policy.reduce(samples.iter().map(|s| s.delay))?,
        transition: policy.reduce(samples.iter().map(|s| s.transition))?,
    })
}
