//! Knot vectors for NURBS curves and surfaces.
//!
//! A [`KnotVector`] is an owned, non-decreasing sequence of parameter values.
//! Every constructor validates or preserves that ordering, so downstream code
//! (span lookup, refinement, clipping) can rely on it without re-checking.
//!
//! # Multiplicity
//!
//! Multiplicity is counted by *exact* float equality. Callers that need a
//! tolerance must snap their values onto existing knots first, e.g. with
//! [`KnotVector::span_index`] and the knot it returns.
//!
//! # Example
//!
//! ```
//! use nurb_engine::geom::KnotVector;
//!
//! let kv = KnotVector::open_uniform(2, 0.0, 1.0, 3).unwrap();
//! assert_eq!(kv.as_slice(), &[0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
//!
//! let raised = kv.with_multiplicity(0.5, 2).unwrap();
//! assert_eq!(raised.multiplicity(0.5), 2);
//! ```

use std::fmt;
use std::iter::repeat_n;

use serde::{Deserialize, Serialize};

use super::core::Tolerance;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KnotVectorError {
    #[error("spline order must be >= 1, got {order}")]
    InvalidOrder { order: usize },
    #[error("knot values must be finite")]
    NonFiniteValue,
    #[error("upper bound {upper} is below lower bound {lower}")]
    InvertedBounds { lower: f64, upper: f64 },
    #[error("knots must be non-decreasing (violated at index {index})")]
    NotNonDecreasing { index: usize },
    #[error("knot range {lower}..{upper} is out of bounds for a vector of {len} knots")]
    IndexOutOfRange { lower: usize, upper: usize, len: usize },
    #[error("knot vector cannot be normalized: {reason}")]
    Degenerate { reason: &'static str },
    #[error("failed to allocate storage for {requested} knots")]
    OutOfMemory { requested: usize },
}

fn alloc_knots(len: usize) -> Result<Vec<f64>, KnotVectorError> {
    let mut knots = Vec::new();
    knots
        .try_reserve_exact(len)
        .map_err(|_| KnotVectorError::OutOfMemory { requested: len })?;
    Ok(knots)
}

fn check_order(order: usize) -> Result<(), KnotVectorError> {
    if order == 0 {
        return Err(KnotVectorError::InvalidOrder { order });
    }
    Ok(())
}

fn check_bounds(lower: f64, upper: f64) -> Result<(), KnotVectorError> {
    if !lower.is_finite() || !upper.is_finite() {
        return Err(KnotVectorError::NonFiniteValue);
    }
    if upper < lower {
        return Err(KnotVectorError::InvertedBounds { lower, upper });
    }
    Ok(())
}

/// An ordered, non-decreasing sequence of knot values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct KnotVector {
    knots: Vec<f64>,
}

impl KnotVector {
    /// Wrap existing values, checking that they are finite and non-decreasing.
    pub fn from_knots(knots: Vec<f64>) -> Result<Self, KnotVectorError> {
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(KnotVectorError::NonFiniteValue);
        }
        if let Some(index) = knots.windows(2).position(|w| w[1] < w[0]) {
            return Err(KnotVectorError::NotNonDecreasing { index: index + 1 });
        }
        Ok(Self { knots })
    }

    /// Open (clamped) uniform knot vector.
    ///
    /// Produces `order` copies of `lower`, `interior_count` evenly stepped
    /// interior values, then `order` copies of `upper`, for a total length of
    /// `2 * order + interior_count`.
    pub fn open_uniform(
        order: usize,
        lower: f64,
        upper: f64,
        interior_count: usize,
    ) -> Result<Self, KnotVectorError> {
        check_order(order)?;
        check_bounds(lower, upper)?;

        let mut knots = alloc_knots(2 * order + interior_count)?;
        let step = (upper - lower) / (interior_count + 1) as f64;
        knots.extend(repeat_n(lower, order));
        knots.extend((1..=interior_count).map(|i| lower + step * i as f64));
        knots.extend(repeat_n(upper, order));
        Ok(Self { knots })
    }

    /// `count` evenly spaced values strictly between `lower` and `upper`.
    pub fn uniform(lower: f64, upper: f64, count: usize) -> Result<Self, KnotVectorError> {
        check_bounds(lower, upper)?;

        let mut knots = alloc_knots(count)?;
        let step = (upper - lower) / (count + 1) as f64;
        knots.extend((1..=count).map(|i| lower + step * i as f64));
        Ok(Self { knots })
    }

    /// `order` copies of `lower` followed by `order` copies of `upper`.
    ///
    /// This is the knot vector of a single Bezier span over `[lower, upper]`.
    pub fn clamped(order: usize, lower: f64, upper: f64) -> Result<Self, KnotVectorError> {
        Self::open_uniform(order, lower, upper, 0)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.knots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.knots.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.knots.last().copied()
    }

    /// Whether every knot is `<=` its successor.
    #[must_use]
    pub fn is_non_decreasing(&self) -> bool {
        self.knots.windows(2).all(|w| w[0] <= w[1])
    }

    /// Stable two-way merge of two knot vectors.
    ///
    /// When values tie, the element from `self` is emitted first.
    pub fn merge(&self, other: &Self) -> Result<Self, KnotVectorError> {
        let (a, b) = (&self.knots, &other.knots);
        let mut knots = alloc_knots(a.len() + b.len())?;

        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i] <= b[j] {
                knots.push(a[i]);
                i += 1;
            } else {
                knots.push(b[j]);
                j += 1;
            }
        }
        knots.extend_from_slice(&a[i..]);
        knots.extend_from_slice(&b[j..]);
        Ok(Self { knots })
    }

    /// Number of knots exactly equal to `value`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn multiplicity(&self, value: f64) -> usize {
        self.knots.iter().filter(|&&k| k == value).count()
    }

    /// Copy of `self` in which `value` has multiplicity `max(existing, target)`.
    pub fn with_multiplicity(&self, value: f64, target: usize) -> Result<Self, KnotVectorError> {
        if !value.is_finite() {
            return Err(KnotVectorError::NonFiniteValue);
        }

        let existing = self.multiplicity(value);
        let missing = target.saturating_sub(existing);
        if missing == 0 {
            log::debug!("knot {value} already has multiplicity {existing} (wanted {target})");
        }

        let mut extra = alloc_knots(missing)?;
        extra.extend(repeat_n(value, missing));
        self.merge(&Self { knots: extra })
    }

    /// Copy of the half-open index range `lower..upper`.
    pub fn extract(&self, lower: usize, upper: usize) -> Result<Self, KnotVectorError> {
        let len = self.knots.len();
        if lower > upper || upper > len {
            return Err(KnotVectorError::IndexOutOfRange { lower, upper, len });
        }

        let mut knots = alloc_knots(upper - lower)?;
        knots.extend_from_slice(&self.knots[lower..upper]);
        Ok(Self { knots })
    }

    /// Divide every knot by the last one, mapping the vector onto `[.., 1]`.
    ///
    /// Fails without touching the vector when it is empty or its last knot is
    /// not strictly positive; dividing by such a value would either produce
    /// NaN or reverse the ordering.
    pub fn normalize(&mut self) -> Result<(), KnotVectorError> {
        let Some(last) = self.last() else {
            return Err(KnotVectorError::Degenerate {
                reason: "knot vector is empty",
            });
        };
        if last <= 0.0 {
            return Err(KnotVectorError::Degenerate {
                reason: "last knot must be positive",
            });
        }

        for knot in &mut self.knots {
            *knot /= last;
        }
        Ok(())
    }

    /// Index of the knot span containing `value` for a spline of `order`.
    ///
    /// The domain is bounded by `knots[order - 1]` and `knots[len - order + 1]`;
    /// values within `tol` of either bound snap onto it. Inside the domain the
    /// span `i` satisfies `knots[i] < value <= knots[i + 1]`, with the lower
    /// boundary itself mapping to `order - 1` and the upper to `len - order - 1`.
    ///
    /// Returns `None` outside the domain, or when the vector is too short to
    /// describe a spline of `order` (fewer than `2 * order` knots, or `order < 2`).
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn span_index(&self, value: f64, order: usize, tol: Tolerance) -> Option<usize> {
        let len = self.knots.len();
        if order < 2 || len < 2 * order {
            return None;
        }

        let lower = self.knots[order - 1];
        let upper = self.knots[len - order + 1];

        let mut value = value;
        if value < lower {
            if !tol.approx_eq_f64(value, lower) {
                return None;
            }
            value = lower;
        }
        if value > upper {
            if !tol.approx_eq_f64(value, upper) {
                return None;
            }
            value = upper;
        }

        if value == upper {
            return Some(len - order - 1);
        }
        if value == lower {
            return Some(order - 1);
        }

        self.knots
            .windows(2)
            .rposition(|w| w[0] < value && value <= w[1])
    }

    /// Parametric domain `(knots[order - 1], knots[len - order])` of a spline.
    #[must_use]
    pub fn domain(&self, order: usize) -> Option<(f64, f64)> {
        let len = self.knots.len();
        if order == 0 || len < 2 * order {
            return None;
        }
        Some((self.knots[order - 1], self.knots[len - order]))
    }

    /// Distinct knot values strictly inside the domain of a spline of `order`.
    #[must_use]
    pub fn distinct_interior(&self, order: usize) -> Vec<f64> {
        let Some((lower, upper)) = self.domain(order) else {
            return Vec::new();
        };
        let mut values: Vec<f64> = self
            .knots
            .iter()
            .copied()
            .filter(|&k| k > lower && k < upper)
            .collect();
        values.dedup();
        values
    }

    /// True when this is a single clamped span: `order` copies of each end.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_single_span(&self, order: usize) -> bool {
        self.knots.len() == 2 * order
            && order > 0
            && self.knots[..order].iter().all(|&k| k == self.knots[0])
            && self.knots[order..].iter().all(|&k| k == self.knots[order])
    }
}

impl TryFrom<Vec<f64>> for KnotVector {
    type Error = KnotVectorError;

    fn try_from(knots: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_knots(knots)
    }
}

impl From<KnotVector> for Vec<f64> {
    fn from(kv: KnotVector) -> Self {
        kv.knots
    }
}

impl fmt::Display for KnotVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, knot) in self.knots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{knot}")?;
        }
        write!(f, "]")
    }
}
