//! Range math and segment planning.
//!
//! Splits a download into N segments, computes HTTP Range header bounds for a
//! segment resumed at some offset, and sanitizes persisted resume offsets.

mod range;

pub use range::{clamp_offsets, plan_segments, Segment};
