pub mod cache_entry;
pub mod netlog;
pub mod range_set;
pub mod utils;

pub use range_set::{Interval, InvalidRangeError, RangeSet};
