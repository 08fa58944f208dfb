//! Lookup tables indexed by sweep values.
//!
//! A [`LookupTable`] stores one value per point of the Cartesian grid of its
//! axes, row-major with the last axis fastest. Axes are strictly increasing.
//!
//! Consumers read it through [`LookupTable::lookup`]: multilinear
//! interpolation inside the grid, linear extrapolation from the two
//! outermost index values outside it, and a constant along any axis with a
//! single index value.

use cellchar_config::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural problems that prevent a table from being built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    /// An axis has no values.
    #[error("axis `{0}` has no values")]
    EmptyAxis(Axis),
    /// An axis lists the same value twice.
    #[error("axis `{axis}` lists {value} twice")]
    DuplicateIndex {
        /// The axis.
        axis: Axis,
        /// The repeated value.
        value: f64,
    },
    /// An axis value is NaN or infinite.
    #[error("axis `{0}` has a non-finite value")]
    NonFiniteIndex(Axis),
    /// A measurement does not sit on a grid point.
    #[error("measurement at {coordinates:?} is off the grid")]
    OffGrid {
        /// Its coordinates.
        coordinates: Vec<f64>,
    },
    /// Two measurements were given for the same grid point.
    #[error("grid point {coordinates:?} measured twice")]
    DuplicateMeasurement {
        /// The grid point.
        coordinates: Vec<f64>,
    },
    /// Some grid points have no measurement.
    #[error("{} of {total} grid points missing: {}", missing.len(), format_points(missing))]
    GridIncomplete {
        /// The missing grid points, in row-major order.
        missing: Vec<Vec<f64>>,
        /// Size of the grid.
        total: usize,
    },
}

fn format_points(points: &[Vec<f64>]) -> String {
    points
        .iter()
        .map(|p| {
            let coords: Vec<String> = p.iter().map(|v| v.to_string()).collect();
            format!("({})", coords.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One index axis of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAxis {
    /// What is swept.
    pub axis: Axis,
    /// Strictly increasing index values.
    pub values: Vec<f64>,
}

/// A place where more load measured less.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonotonicityViolation {
    /// The grid point with the larger load.
    pub coordinates: Vec<f64>,
    /// The value at the next smaller load.
    pub previous: f64,
    /// The value here.
    pub value: f64,
}

impl fmt::Display for MonotonicityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value {} at {} is below {} at the previous load",
            self.value,
            format_points(std::slice::from_ref(&self.coordinates)),
            self.previous
        )
    }
}

/// A grid of measured values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    /// Index axes, outermost first.
    pub axes: Vec<TableAxis>,
    /// Row-major values, last axis fastest.
    pub values: Vec<f64>,
}

impl LookupTable {
    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.axes.len()];
        for i in (0..self.axes.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.axes[i + 1].values.len();
        }
        strides
    }

    /// The value at grid indices `index`, one per axis.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.axes.len() {
            return None;
        }
        let mut flat = 0;
        for ((i, stride), axis) in index.iter().zip(self.strides()).zip(&self.axes) {
            if *i >= axis.values.len() {
                return None;
            }
            flat += i * stride;
        }
        self.values.get(flat).copied()
    }

    /// The largest value in the table.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Evaluates the table at `point` (one coordinate per axis).
    ///
    /// Returns `None` if the number of coordinates does not match.
    pub fn lookup(&self, point: &[f64]) -> Option<f64> {
        if point.len() != self.axes.len() {
            return None;
        }
        // per axis: the lower bracket index and the weight of the upper one
        let brackets: Vec<(usize, f64)> = self
            .axes
            .iter()
            .zip(point)
            .map(|(axis, &x)| bracket(&axis.values, x))
            .collect();
        let strides = self.strides();

        let mut total = 0.0;
        for corner in 0..(1usize << brackets.len()) {
            let mut weight = 1.0;
            let mut flat = 0;
            for (i, &(lo, t)) in brackets.iter().enumerate() {
                let upper = (corner >> i) & 1 == 1;
                let single = self.axes[i].values.len() == 1;
                if single && upper {
                    weight = 0.0;
                    break;
                }
                weight *= if single {
                    1.0
                } else if upper {
                    t
                } else {
                    1.0 - t
                };
                flat += (lo + usize::from(upper)) * strides[i];
            }
            if weight != 0.0 {
                total += weight * self.values[flat];
            }
        }
        Some(total)
    }
}

/// The lower bracket index of `x` in `values` and the interpolation weight
/// of the next index. The weight leaves `[0, 1]` when `x` is outside the
/// axis, which extrapolates from the outermost pair.
fn bracket(values: &[f64], x: f64) -> (usize, f64) {
    if values.len() < 2 {
        return (0, 0.0);
    }
    let upper = values.partition_point(|&v| v <= x);
    let lo = upper.clamp(1, values.len() - 1) - 1;
    let (a, b) = (values[lo], values[lo + 1]);
    (lo, (x - a) / (b - a))
}

/// Assembles a [`LookupTable`] from measurements given in any order.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    axes: Vec<TableAxis>,
    slots: Vec<Option<f64>>,
    duplicate: Option<Vec<f64>>,
    off_grid: Option<Vec<f64>>,
}

impl TableBuilder {
    /// Creates a builder over `axes`. Each axis is sorted ascending.
    pub fn new(axes: impl IntoIterator<Item = (Axis, Vec<f64>)>) -> Result<Self, TableError> {
        let mut sorted = Vec::new();
        for (axis, mut values) in axes {
            if values.is_empty() {
                return Err(TableError::EmptyAxis(axis));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(TableError::NonFiniteIndex(axis));
            }
            values.sort_by(f64::total_cmp);
            if let Some(w) = values.windows(2).find(|w| w[0] == w[1]) {
                return Err(TableError::DuplicateIndex { axis, value: w[0] });
            }
            sorted.push(TableAxis { axis, values });
        }
        let size = sorted.iter().map(|a| a.values.len()).product();
        Ok(Self {
            axes: sorted,
            slots: vec![None; size],
            duplicate: None,
            off_grid: None,
        })
    }

    fn flat_index(&self, coordinates: &[f64]) -> Option<usize> {
        if coordinates.len() != self.axes.len() {
            return None;
        }
        let mut flat = 0;
        for (axis, &x) in self.axes.iter().zip(coordinates) {
            let i = axis.values.iter().position(|&v| v == x)?;
            flat = flat * axis.values.len() + i;
        }
        Some(flat)
    }

    /// Places a measurement. Problems are reported by [`build`](Self::build).
    pub fn insert(&mut self, coordinates: &[f64], value: f64) {
        match self.flat_index(coordinates) {
            None => {
                self.off_grid.get_or_insert_with(|| coordinates.to_vec());
            }
            Some(flat) if self.slots[flat].is_some() => {
                self.duplicate.get_or_insert_with(|| coordinates.to_vec());
            }
            Some(flat) => self.slots[flat] = Some(value),
        }
    }

    fn coordinates(&self, mut flat: usize) -> Vec<f64> {
        let mut coords = vec![0.0; self.axes.len()];
        for (i, axis) in self.axes.iter().enumerate().rev() {
            coords[i] = axis.values[flat % axis.values.len()];
            flat /= axis.values.len();
        }
        coords
    }

    /// Finishes the table and checks that values do not decrease along the
    /// load axis. Inversions are returned alongside the table, which keeps
    /// every measured value.
    pub fn build(self) -> Result<(LookupTable, Vec<MonotonicityViolation>), TableError> {
        if let Some(coordinates) = self.off_grid {
            return Err(TableError::OffGrid { coordinates });
        }
        if let Some(coordinates) = self.duplicate {
            return Err(TableError::DuplicateMeasurement { coordinates });
        }
        let missing: Vec<Vec<f64>> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(flat, _)| self.coordinates(flat))
            .collect();
        if !missing.is_empty() {
            return Err(TableError::GridIncomplete {
                missing,
                total: self.slots.len(),
            });
        }

        let table = LookupTable {
            values: self.slots.iter().map(|s| s.unwrap_or(f64::NAN)).collect(),
            axes: self.axes,
        };
        let violations = load_inversions(&table);
        Ok((table, violations))
    }
}

fn load_inversions(table: &LookupTable) -> Vec<MonotonicityViolation> {
    let Some(load) = table.axes.iter().position(|a| a.axis == Axis::Load) else {
        return Vec::new();
    };
    let stride = table.strides()[load];
    let loads = table.axes[load].values.len();
    let mut violations = Vec::new();
    for flat in 0..table.values.len() {
        if (flat / stride) % loads == 0 {
            continue;
        }
        let previous = table.values[flat - stride];
        let value = table.values[flat];
        if value < previous {
            let mut coordinates = Vec::with_capacity(table.axes.len());
            let mut rest = flat;
            for axis in table.axes.iter().rev() {
                coordinates.push(axis.values[rest % axis.values.len()]);
                rest /= axis.values.len();
            }
            coordinates.reverse();
            violations.push(MonotonicityViolation {
                coordinates,
                previous,
                value,
            });
        }
    }
    violations
}
