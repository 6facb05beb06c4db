//! Layer 5: Engine
//!
//! # Purpose
//!
//! This layer coordinates a complete fit:
//! - Input validation against the configuration and the problem shape
//! - The outer/inner Levenberg-Marquardt iteration loop
//! - Result assembly with status, norms, counts, and optional arrays
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine ← You are here
//!   ↓
//! Layer 4: Evaluation
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Iteration loop and solve configuration.
pub mod executor;

/// Termination statuses and the fit result.
pub mod output;

/// Input validation.
pub mod validator;
