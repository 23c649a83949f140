//! Source analysis used to rank component candidates.

pub mod complexity;
pub mod component;

pub use complexity::{complexity_score, count_lines, is_simple, LineCounts, SIMPLE_THRESHOLD};
pub use component::{ComponentAnalyzer, ComponentFacts, LexicalAnalyzer};
