//! Document analysis: prompts, the strategy ladder and response parsing

mod analyzer;
pub mod parser;
pub mod prompt;

pub use analyzer::{AnalysisOutcome, AnalyzerSettings, DocumentAnalyzer};
pub use parser::{parse, parse_or_error, ParseOutcome};
