//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts to tell "nothing recognized" apart from real failures.

use brickscan_core::{ErrorKind, HistoryError, RecognitionError, ScanError};

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// The service answered but recognized nothing in the image.
pub const NO_RESULTS: i32 = 3;

/// Data format error (response did not match the expected schema).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file, or the requested record does not exist.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (network, server error).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (history database, output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Configuration error (malformed endpoint URL).
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
    /// False for legitimate outcomes such as "nothing found", which are
    /// reported as a notice rather than an error.
    pub is_fault: bool,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(e) = find_recognition_error(err) {
            let kind = e.kind();
            if !kind.is_fault() {
                return Self {
                    code: for_kind(kind),
                    message: Some(e.user_message()),
                    is_fault: false,
                };
            }
        }

        let message = format!("{err:#}");

        let code = classify_chain(err).unwrap_or_else(|| {
            if message.contains("Failed to read image") || message.contains("not found") {
                INPUT_ERROR
            } else if message.contains("Failed to write") {
                IO_ERROR
            } else {
                GENERAL_ERROR
            }
        });

        Self {
            code,
            message: Some(message),
            is_fault: true,
        }
    }
}

/// Exit code for a recognition failure kind.
pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidUrl => CONFIG_ERROR,
        ErrorKind::Network | ErrorKind::ServerError => NETWORK_ERROR,
        ErrorKind::Decoding => DATA_ERROR,
        ErrorKind::NoResults => NO_RESULTS,
    }
}

fn find_recognition_error(err: &anyhow::Error) -> Option<&RecognitionError> {
    err.chain().find_map(|cause| match cause.downcast_ref::<ScanError>() {
        Some(ScanError::Recognition(e)) => Some(e),
        Some(_) => None,
        None => cause.downcast_ref::<RecognitionError>(),
    })
}

// Typed errors first: message matching is only the fallback.
fn classify_chain(err: &anyhow::Error) -> Option<i32> {
    for cause in err.chain() {
        if let Some(scan) = cause.downcast_ref::<ScanError>() {
            return Some(match scan {
                ScanError::Busy => GENERAL_ERROR,
                ScanError::Recognition(e) => for_kind(e.kind()),
                ScanError::History { .. } => IO_ERROR,
            });
        }
        if let Some(e) = cause.downcast_ref::<RecognitionError>() {
            return Some(for_kind(e.kind()));
        }
        if cause.downcast_ref::<HistoryError>().is_some() {
            return Some(IO_ERROR);
        }
    }
    None
}
