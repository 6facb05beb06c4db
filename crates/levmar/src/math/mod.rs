//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides the dense numeric kernels the fitting algorithms are
//! built from:
//! - An overflow-safe Euclidean norm and machine constants
//! - QR factorization with column pivoting and the damped triangular solve
//!
//! These are reusable mathematical building blocks with no fitting-specific
//! logic.
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine
//!   ↓
//! Layer 4: Evaluation
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Overflow-safe Euclidean norm and machine constants.
pub mod norm;

/// QR factorization and damped triangular solve.
pub mod qr;
