pub mod deep;
pub mod llm;
pub mod triage;

pub use deep::extract_from_ranges;
pub use triage::{tail_fallback, triage, MessageRange};
