//! Layer 3: Algorithms
//!
//! # Purpose
//!
//! This layer implements the fitting-specific machinery that sits between
//! the raw numeric kernels and the iteration engine:
//! - Box constraint bookkeeping (free sets, pegging, step clamping, ties)
//! - Jacobian assembly from finite differences or analytic columns
//! - The damping parameter search for the trust-region subproblem
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
//! Layer 3: Algorithms ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Box constraints, free parameter sets, and step clamping.
pub mod constraints;

/// Jacobian assembly from user derivatives or finite differences.
pub mod jacobian;

/// Damping parameter search for the trust-region subproblem.
pub mod lmpar;
