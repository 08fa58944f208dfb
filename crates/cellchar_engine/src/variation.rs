//! The sweep of independent test parameters.
//!
//! A [`VariationSpace`] holds the configured values of each [`Axis`].
//! [`VariationSpace::variations`] enumerates the Cartesian product of a
//! requested subset of axes in row-major order: the last requested axis
//! varies fastest. The enumeration is lazy and can be restarted by calling
//! it again.

use cellchar_config::{Axis, Sweeps};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a set of axes cannot be enumerated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariationError {
    /// The space has no such axis.
    #[error("unknown variation axis `{0}`")]
    UnknownAxis(Axis),
    /// The axis has no values.
    #[error("variation axis `{0}` is empty")]
    EmptyAxis(Axis),
    /// The axis was requested twice.
    #[error("variation axis `{0}` requested twice")]
    DuplicateAxis(Axis),
}

/// One combination of sweep values, in library units.
///
/// Axes outside the request that produced the point are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationPoint {
    /// Data (or async control) input transition time.
    pub data_slew: Option<f64>,
    /// Clock transition time.
    pub clock_slew: Option<f64>,
    /// Output load.
    pub load: Option<f64>,
}

impl VariationPoint {
    /// The value on `axis`, if set.
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::DataSlew => self.data_slew,
            Axis::ClockSlew => self.clock_slew,
            Axis::Load => self.load,
        }
    }

    fn set(&mut self, axis: Axis, value: f64) {
        let slot = match axis {
            Axis::DataSlew => &mut self.data_slew,
            Axis::ClockSlew => &mut self.clock_slew,
            Axis::Load => &mut self.load,
        };
        *slot = Some(value);
    }

    /// The values on `axes`, in order. Unset axes read as NaN.
    pub fn coordinates(&self, axes: &[Axis]) -> Vec<f64> {
        axes.iter()
            .map(|&a| self.get(a).unwrap_or(f64::NAN))
            .collect()
    }
}

impl fmt::Display for VariationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for axis in [Axis::DataSlew, Axis::ClockSlew, Axis::Load] {
            if let Some(value) = self.get(axis) {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{axis}={value}")?;
                first = false;
            }
        }
        if first {
            f.write_str("(none)")?;
        }
        Ok(())
    }
}

/// Named sweep axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariationSpace {
    axes: Vec<(Axis, Vec<f64>)>,
}

impl VariationSpace {
    /// An empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// A space with every axis configured for a cell.
    pub fn from_sweeps(sweeps: &Sweeps) -> Self {
        [Axis::DataSlew, Axis::ClockSlew, Axis::Load]
            .into_iter()
            .fold(Self::new(), |space, axis| {
                space.with_axis(axis, sweeps.values(axis).to_vec())
            })
    }

    /// Adds or replaces an axis.
    pub fn with_axis(mut self, axis: Axis, values: Vec<f64>) -> Self {
        match self.axes.iter_mut().find(|(a, _)| *a == axis) {
            Some(entry) => entry.1 = values,
            None => self.axes.push((axis, values)),
        }
        self
    }

    /// The values of `axis`, in configured order.
    pub fn values(&self, axis: Axis) -> Option<&[f64]> {
        self.axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, v)| v.as_slice())
    }

    /// Enumerates the product of `request`, row-major in request order.
    pub fn variations(&self, request: &[Axis]) -> Result<Variations<'_>, VariationError> {
        let mut axes = Vec::with_capacity(request.len());
        for (i, &axis) in request.iter().enumerate() {
            if request[..i].contains(&axis) {
                return Err(VariationError::DuplicateAxis(axis));
            }
            let values = self.values(axis).ok_or(VariationError::UnknownAxis(axis))?;
            if values.is_empty() {
                return Err(VariationError::EmptyAxis(axis));
            }
            axes.push((axis, values));
        }
        let len = axes.iter().map(|(_, v)| v.len()).product();
        Ok(Variations {
            axes,
            index: 0,
            len,
        })
    }
}

/// Lazy row-major enumeration of [`VariationPoint`]s.
#[derive(Debug, Clone)]
pub struct Variations<'s> {
    axes: Vec<(Axis, &'s [f64])>,
    index: usize,
    len: usize,
}

impl Variations<'_> {
    fn point(&self, mut index: usize) -> VariationPoint {
        let mut point = VariationPoint::default();
        for (axis, values) in self.axes.iter().rev() {
            point.set(*axis, values[index % values.len()]);
            index /= values.len();
        }
        point
    }
}

impl Iterator for Variations<'_> {
    type Item = VariationPoint;

    fn next(&mut self) -> Option<VariationPoint> {
        if self.index >= self.len {
            return None;
        }
        let point = self.point(self.index);
        self.index += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Variations<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> VariationSpace {
        VariationSpace::new()
            .with_axis(Axis::DataSlew, vec![0.01, 0.05])
            .with_axis(Axis::Load, vec![0.001, 0.005, 0.01])
            .with_axis(Axis::ClockSlew, vec![])
    }

    #[test]
    fn row_major_in_request_order() {
        let points: Vec<_> = space()
            .variations(&[Axis::DataSlew, Axis::Load])
            .unwrap()
            .map(|p| (p.data_slew.unwrap(), p.load.unwrap()))
            .collect();
        assert_eq!(
            points,
            vec![
                (0.01, 0.001),
                (0.01, 0.005),
                (0.01, 0.01),
                (0.05, 0.001),
                (0.05, 0.005),
                (0.05, 0.01),
            ]
        );
    }

    #[test]
    fn request_order_decides_fastest_axis() {
        let first: Vec<_> = space()
            .variations(&[Axis::Load, Axis::DataSlew])
            .unwrap()
            .take(2)
            .map(|p| p.data_slew.unwrap())
            .collect();
        assert_eq!(first, vec![0.01, 0.05]);
    }

    #[test]
    fn unrequested_axes_are_unset() {
        let p = space().variations(&[Axis::Load]).unwrap().next().unwrap();
        assert_eq!(p.data_slew, None);
        assert_eq!(p.to_string(), "load=0.001");
    }

    #[test]
    fn restartable_and_exact_size() {
        let space = space();
        let v = space.variations(&[Axis::DataSlew, Axis::Load]).unwrap();
        assert_eq!(v.len(), 6);
        let a: Vec<_> = v.clone().collect();
        let b: Vec<_> = v.collect();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_request_yields_one_point() {
        let points: Vec<_> = space().variations(&[]).unwrap().collect();
        assert_eq!(points, vec![VariationPoint::default()]);
    }

    #[test]
    fn errors() {
        assert_eq!(
            space().variations(&[Axis::ClockSlew]).unwrap_err(),
            VariationError::EmptyAxis(Axis::ClockSlew)
        );
        let partial = VariationSpace::new().with_axis(Axis::Load, vec![1.0]);
        assert_eq!(
            partial.variations(&[Axis::DataSlew]).unwrap_err(),
            VariationError::UnknownAxis(Axis::DataSlew)
        );
        assert_eq!(
            space().variations(&[Axis::Load, Axis::Load]).unwrap_err(),
            VariationError::DuplicateAxis(Axis::Load)
        );
    }

    #[test]
    fn from_sweeps_keeps_configured_order() {
        let sweeps = Sweeps {
            data_slews: vec![0.05, 0.01],
            clock_slews: vec![0.02],
            loads: vec![0.1],
        };
        let space = VariationSpace::from_sweeps(&sweeps);
        assert_eq!(space.values(Axis::DataSlew), Some(&[0.05, 0.01][..]));
        let all = space.variations(&[Axis::DataSlew, Axis::ClockSlew, Axis::Load]);
        assert_eq!(all.unwrap().len(), 2);
    }
}
