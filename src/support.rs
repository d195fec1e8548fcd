//! Supporting utilities.
//!
//! These are public because they're useful alongside the scheduler, but their
//! APIs are not stable.

pub mod constraint;
