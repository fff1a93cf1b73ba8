//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3-9     | document         | Reading and aggregating an estimate file |
//! | 10-19   | store            | SQLite persistence                       |
//! | 20-29   | config           | Settings file                            |
//!
//! Validation failures are diagnostic and never change the exit code.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use smeta_engine::EngineError;
use smeta_io::{IngestError, ReadError, StoreError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Document (3-9)
// =============================================================================

/// Estimate file missing or unreadable.
pub const EXIT_DOC_IO: u8 = 3;

/// Ill-formed XML or undecodable text.
pub const EXIT_DOC_MALFORMED: u8 = 4;

/// Document has no captioned chapter.
pub const EXIT_DOC_NO_SECTIONS: u8 = 5;

// =============================================================================
// Store (10-19)
// =============================================================================

/// Database could not be opened or a statement failed. Nothing was written.
pub const EXIT_STORE_FAILED: u8 = 10;

/// Target estimate record does not exist. Nothing was written.
pub const EXIT_STORE_UNKNOWN_RECORD: u8 = 11;

// =============================================================================
// Config (20-29)
// =============================================================================

/// Settings file given with --config is unreadable or invalid.
pub const EXIT_CONFIG: u8 = 20;

// =============================================================================
// Error mapping
// =============================================================================

pub fn read_exit_code(err: &ReadError) -> u8 {
    match err {
        ReadError::Io { .. } => EXIT_DOC_IO,
        ReadError::Xml { .. } | ReadError::Encoding(_) => EXIT_DOC_MALFORMED,
    }
}

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::UnknownRecord(_) => EXIT_STORE_UNKNOWN_RECORD,
        StoreError::Io(_) | StoreError::Sql(_) => EXIT_STORE_FAILED,
    }
}

/// Map an IngestError to its exit code.
pub fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::Read(e) => read_exit_code(e),
        IngestError::Engine(EngineError::NoSections) => EXIT_DOC_NO_SECTIONS,
        IngestError::Store(e) => store_exit_code(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_outside_universal() {
        let codes = [
            EXIT_DOC_IO,
            EXIT_DOC_MALFORMED,
            EXIT_DOC_NO_SECTIONS,
            EXIT_STORE_FAILED,
            EXIT_STORE_UNKNOWN_RECORD,
            EXIT_CONFIG,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(*a > EXIT_USAGE);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_ERROR, 1);
    }

    #[test]
    fn ingest_errors_map_to_their_range() {
        let xml = IngestError::Read(ReadError::Xml { offset: 3, message: "bad".into() });
        assert_eq!(ingest_exit_code(&xml), EXIT_DOC_MALFORMED);
        assert_eq!(
            ingest_exit_code(&IngestError::Engine(EngineError::NoSections)),
            EXIT_DOC_NO_SECTIONS
        );
        assert_eq!(
            ingest_exit_code(&IngestError::Store(StoreError::UnknownRecord(7))),
            EXIT_STORE_UNKNOWN_RECORD
        );
    }
}
