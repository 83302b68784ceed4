//! Response formatting
//!
//! The assistant deliberately answers with a single line; the rest of the
//! model output is discarded. Raw sample-data dumps from the insight path
//! are replaced with a fixed sentence so row contents never land verbatim
//! in the transcript. Both behaviors are configurable.

use crate::config::FormatConfig;

const SAMPLE_DATA_MARKER: &str = "Sample data from";
const SAMPLE_DATA_SUMMARY: &str =
    "I have identified some sample data. Please specify if you need more details.";

/// Normalizes model output for display.
pub struct ResponseFormatter {
    first_line_only: bool,
}

impl ResponseFormatter {
    pub fn new(config: &FormatConfig) -> Self {
        Self {
            first_line_only: config.first_line_only,
        }
    }

    pub fn format(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let first_line = trimmed.lines().next().unwrap_or("").trim_end();

        if first_line.contains(SAMPLE_DATA_MARKER) {
            return SAMPLE_DATA_SUMMARY.to_string();
        }

        if self.first_line_only {
            first_line.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(first_line_only: bool) -> ResponseFormatter {
        ResponseFormatter::new(&FormatConfig { first_line_only })
    }

    #[test]
    fn test_keeps_only_first_line() {
        let raw = "The sky is blue.\nIt scatters short wavelengths.\nThat is Rayleigh scattering.";
        assert_eq!(formatter(true).format(raw), "The sky is blue.");
    }

    #[test]
    fn test_sample_data_is_summarized() {
        let raw = "Sample data from users: [(1, 'ada')]";
        assert_eq!(formatter(true).format(raw), SAMPLE_DATA_SUMMARY);
        // The marker wins even with truncation disabled.
        assert_eq!(formatter(false).format(raw), SAMPLE_DATA_SUMMARY);
    }

    #[test]
    fn test_truncation_can_be_disabled() {
        let raw = "First line.\nSecond line.";
        assert_eq!(formatter(false).format(raw), "First line.\nSecond line.");
    }

    #[test]
    fn test_leading_whitespace_is_trimmed() {
        assert_eq!(formatter(true).format("\n\n  Answer.  \nrest"), "Answer.");
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(formatter(true).format(""), "");
    }
}
