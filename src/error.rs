/**
 * Error taxonomy for folder resolution, tool invocation and timestamp handling
 */

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Folder name (or its date part) does not have the expected shape
    #[error("No date found in folder name '{0}'")]
    NoDateMatch(String),

    /// Date digits were found but a component is outside its range
    #[error("Date component out of range in '{token}': {detail}")]
    DateOutOfRange { token: String, detail: String },

    /// Executable missing or version probe failed
    #[error("exiftool is not available at {}", .0.display())]
    ToolUnavailable(PathBuf),

    /// The tool ran but reported an error in its output
    #[error("exiftool reported an error: {0}")]
    ToolFailed(String),

    /// Capture date tag present but not in `year:month:day hour:minute:second` form
    #[error("Unparsable capture date '{0}'")]
    InvalidCaptureDate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrganizeError>;
