pub mod range_consolidation;
