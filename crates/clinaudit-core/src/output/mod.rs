//! Parse & repair of raw model responses.
//!
//! Raw text is turned into a [`ParseResult`](crate::types::ParseResult)
//! through candidate extraction, a bounded repair loop, and a shape check
//! against the embedded model output schema.

mod extract;
mod parser;

pub use extract::{extract_candidate, strip_trailing_commas, Candidate, CandidateSource};
pub use parser::{parse_model_output, parse_model_output_with, DEFAULT_MAX_REPAIR_ATTEMPTS};
