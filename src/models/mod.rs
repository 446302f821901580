//! Data models for the contest tracker.

mod contest;
mod status;

pub use contest::*;
pub use status::*;
