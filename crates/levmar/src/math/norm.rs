//! Overflow-safe Euclidean norm and machine constants.
//!
//! The norm follows the classic MINPACK formulation: components are
//! accumulated in three sums (small, intermediate, large) with breakpoints
//! derived from the floating type, so the result neither underflows nor
//! overflows whenever the true norm is representable.

// External dependencies
use num_traits::Float;

// ============================================================================
// Machine Constants
// ============================================================================

/// Machine epsilon for `T`.
#[inline]
pub fn machep<T: Float>() -> T {
    T::epsilon()
}

/// Smallest positive normalized value of `T`.
#[inline]
pub fn dwarf<T: Float>() -> T {
    T::min_positive_value()
}

/// Largest finite value of `T`.
#[inline]
pub fn giant<T: Float>() -> T {
    T::max_value()
}

// Breakpoint below which components are accumulated in the small sum.
#[inline]
fn rdwarf<T: Float>() -> T {
    (dwarf::<T>() * T::from(1.5).unwrap()).sqrt() * T::from(10.0).unwrap()
}

// Breakpoint above which components are accumulated in the large sum.
#[inline]
fn rgiant<T: Float>() -> T {
    giant::<T>().sqrt() * T::from(0.1).unwrap()
}

// ============================================================================
// Euclidean Norm
// ============================================================================

/// Euclidean norm of `v`, robust against overflow and underflow.
///
/// Components are split at `rdwarf`/`rgiant / n` into three partial sums;
/// the small and large sums are carried in rescaled form relative to the
/// largest component seen so far.
pub fn enorm<T: Float>(v: &[T]) -> T {
    let zero = T::zero();
    let one = T::one();

    let mut s1 = zero;
    let mut s2 = zero;
    let mut s3 = zero;
    let mut x1max = zero;
    let mut x3max = zero;

    let rdwarf = rdwarf::<T>();
    let agiant = rgiant::<T>() / T::from(v.len().max(1)).unwrap();

    for &val in v {
        let xabs = val.abs();
        if xabs > rdwarf && xabs < agiant {
            // Sum for intermediate components.
            s2 = s2 + xabs * xabs;
        } else if xabs <= rdwarf {
            // Sum for small components.
            if xabs > x3max {
                let ratio = x3max / xabs;
                s3 = one + s3 * ratio * ratio;
                x3max = xabs;
            } else if xabs != zero {
                let ratio = xabs / x3max;
                s3 = s3 + ratio * ratio;
            }
        } else {
            // Sum for large components.
            if xabs > x1max {
                let ratio = x1max / xabs;
                s1 = one + s1 * ratio * ratio;
                x1max = xabs;
            } else {
                let ratio = xabs / x1max;
                s1 = s1 + ratio * ratio;
            }
        }
    }

    if s1 != zero {
        x1max * (s1 + (s2 / x1max) / x1max).sqrt()
    } else if s2 != zero {
        if s2 >= x3max {
            (s2 * (one + (x3max / s2) * (x3max * s3))).sqrt()
        } else {
            (x3max * ((s2 / x3max) + (x3max * s3))).sqrt()
        }
    } else {
        x3max * s3.sqrt()
    }
}
