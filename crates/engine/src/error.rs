use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The document contained no captioned chapter at all.
    NoSections,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSections => write!(f, "document has no captioned Chapter (no sections found)"),
        }
    }
}

impl std::error::Error for EngineError {}
