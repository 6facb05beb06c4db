//! Layer 4: Evaluation
//!
//! # Purpose
//!
//! This layer turns the internal state left behind by the iteration loop
//! into user-facing quality measures:
//! - Covariance matrix of the fitted parameters
//! - 1-sigma parameter uncertainties
//!
//! # Architecture
//!
//! ```text
//! Layer 6: API
//!   ↓
//! Layer 5: Engine
//!   ↓
//! Layer 4: Evaluation ← You are here
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Parameter covariance and uncertainty extraction.
pub mod covariance;
