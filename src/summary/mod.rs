//! Job summaries printed by the tool under test

mod extract;
mod types;

pub use extract::{extract_final_object, extract_final_object_by_lines, final_summary_text};
pub use types::{JobSummary, OutputEnvelope};

use crate::common::Result;

/// Parse the final job summary out of captured tool output
pub fn parse_final_summary(output: &str) -> Result<JobSummary> {
    JobSummary::parse(&final_summary_text(output)?)
}
