//! Memory management and buffer recycling for the fitting engine.
//!
//! ## Purpose
//!
//! This module provides the reusable workspace a solve runs in. All working
//! arrays are allocated once per solve (or recycled across solves when the
//! caller keeps the buffer) so the iteration loops themselves are
//! allocation-free.
//!
//! ## Design notes
//!
//! * **Centralized Ownership**: One struct holds every scratch array the
//!   engine, Jacobian builder, step solver, and covariance pass need.
//! * **Lazy Expansion**: Buffers are resized on demand but never shrunk,
//!   stabilizing at the maximum required size.
//! * **Column-major Jacobian**: `fjac` stores the `m x nfree` Jacobian one
//!   column after another, matching the QR routines.
//!
//! ## Key concepts
//!
//! * **Slot**: A reusable vector wrapper with automatic capacity management.
//! * **LevmarBuffer**: Working memory for a whole solve.
//! * **Scratch sizing**: `wa2` and `wa4` are residual-length because the
//!   difference probes need full residual vectors; `wa1`/`wa3` are
//!   free-parameter-length.
//!
//! ## Invariants
//!
//! * Buffers are only logically cleared between iterations, not deallocated.
//! * `prepare` leaves every array at exactly the advertised length.
//!
//! ## Non-goals
//!
//! * Thread-local caching (one buffer belongs to one solve at a time).
//! * Dynamic shrinking or aggressive memory reclamation.

// Feature-gated dependencies
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::ops::{Deref, DerefMut};
use num_traits::Zero;

// ============================================================================
// Slot - Unified Vector Abstraction
// ============================================================================

/// A reusable vector slot with automatic capacity management.
#[derive(Debug, Clone)]
pub struct Slot<T>(Vec<T>);

impl<T> Slot<T> {
    /// Create a new slot with the given initial capacity.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Clear the slot (sets length to 0, preserves capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Get a reference to the underlying vector.
    #[inline]
    pub fn as_vec(&self) -> &Vec<T> {
        &self.0
    }

    /// Get a mutable reference to the underlying vector.
    #[inline]
    pub fn as_vec_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Deref for Slot<T> {
    type Target = Vec<T>;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Slot<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for Slot<T> {
    fn from(v: Vec<T>) -> Self {
        Self(v)
    }
}

// ============================================================================
// LevmarBuffer - Working Memory for a Solve
// ============================================================================

/// Working memory for a Levenberg-Marquardt solve.
///
/// Sized by `prepare` from the problem dimensions: `m` residuals, `npar`
/// parameters, `nfree` free parameters.
#[derive(Debug, Clone)]
pub struct LevmarBuffer<T> {
    /// Residuals at the current accepted point (`m`).
    pub fvec: Slot<T>,

    /// Jacobian, column-major `m x nfree`; overwritten by its QR factors.
    pub fjac: Slot<T>,

    /// First `nfree` components of `Q^T * fvec`.
    pub qtf: Slot<T>,

    /// Scaling factors, indexed by full parameter index (`npar`).
    pub diag: Slot<T>,

    /// Free-parameter vector (`nfree`).
    pub x: Slot<T>,

    /// Trial full parameter vector (`npar`).
    pub xnew: Slot<T>,

    /// QR pivot permutation (`nfree`).
    pub ipvt: Slot<usize>,

    /// Free-parameter-length scratch.
    pub wa1: Slot<T>,

    /// Residual-length scratch (also used for column norms and trial values,
    /// which fit because `m >= nfree`).
    pub wa2: Slot<T>,

    /// Free-parameter-length scratch.
    pub wa3: Slot<T>,

    /// Residual-length scratch (trial residuals, difference probes).
    pub wa4: Slot<T>,

    /// Per-parameter offset of the analytic derivative column inside
    /// `fjac`; `None` for numeric parameters.
    pub jac_offsets: Slot<Option<usize>>,
}

impl<T> Default for LevmarBuffer<T> {
    fn default() -> Self {
        Self {
            fvec: Slot::default(),
            fjac: Slot::default(),
            qtf: Slot::default(),
            diag: Slot::default(),
            x: Slot::default(),
            xnew: Slot::default(),
            ipvt: Slot::default(),
            wa1: Slot::default(),
            wa2: Slot::default(),
            wa3: Slot::default(),
            wa4: Slot::default(),
            jac_offsets: Slot::default(),
        }
    }
}

impl<T: Zero + Clone> LevmarBuffer<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size every array for a solve with `m` residuals, `npar` parameters,
    /// and `nfree` free parameters.
    pub fn prepare(&mut self, m: usize, npar: usize, nfree: usize) {
        self.fvec.as_vec_mut().assign(m, T::zero());
        self.fjac.as_vec_mut().assign(m * nfree, T::zero());
        self.qtf.as_vec_mut().assign(nfree, T::zero());
        self.diag.as_vec_mut().assign(npar, T::zero());
        self.x.as_vec_mut().assign(nfree, T::zero());
        self.xnew.as_vec_mut().assign(npar, T::zero());
        self.ipvt.as_vec_mut().assign(nfree, 0);
        self.wa1.as_vec_mut().assign(nfree, T::zero());
        self.wa2.as_vec_mut().assign(m, T::zero());
        self.wa3.as_vec_mut().assign(nfree, T::zero());
        self.wa4.as_vec_mut().assign(m, T::zero());
        self.jac_offsets.as_vec_mut().assign(npar, None);
    }
}

// ============================================================================
// Vector Extension Helpers
// ============================================================================

/// Helper trait to simplify resizing and filling vectors.
pub trait VecExt<T> {
    /// Resize the vector to `n` and fill with `val`.
    fn assign(&mut self, n: usize, val: T);
    /// Replaces the vector contents with `slice`, reusing capacity.
    fn assign_slice(&mut self, slice: &[T]);
}

impl<T: Clone> VecExt<T> for Vec<T> {
    fn assign(&mut self, n: usize, val: T) {
        if self.len() != n {
            self.clear();
            self.resize(n, val);
        } else {
            self.fill(val);
        }
    }

    fn assign_slice(&mut self, slice: &[T]) {
        self.clear();
        self.extend_from_slice(slice);
    }
}
