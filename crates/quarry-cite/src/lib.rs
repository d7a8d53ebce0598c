//! quarry-cite - Citation attribution
//!
//! Splits generated answers into sentence-like spans, attributes each span
//! to the retrieved chunks that support it, and assembles display records
//! for a "sources used" panel.

pub mod attribute;
pub mod records;
pub mod spans;

pub use attribute::insert_citations;
pub use records::build_citations;
pub use spans::split_spans;
