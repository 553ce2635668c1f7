/// A response line that does not decode into a sensor record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid frame ({reason}): '{raw_line}'")]
pub struct ParseError {
    pub reason: String,
    pub raw_line: String,
}

impl ParseError {
    pub fn new<S: Into<String>>(reason: S, raw_line: &str) -> Self {
        Self {
            reason: reason.into(),
            raw_line: raw_line.to_string(),
        }
    }
}
