use std::{fmt, io};

#[derive(Debug)]
pub enum SplatError {
    HeaderNotFound,
    MalformedHeader(String),
    TruncatedInput {
        offset: usize,
        need: usize,
        len: usize,
    },
    MalformedRow(String),
    EmptyCloud,
    Backend(String),
    IoError(io::Error),
}

impl fmt::Display for SplatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplatError::HeaderNotFound => {
                write!(f, "No end-of-header marker within the scan window.")
            }
            SplatError::MalformedHeader(e) => {
                write!(f, "Failed to parse the .ply header: {}", e)
            }
            SplatError::TruncatedInput { offset, need, len } => {
                write!(
                    f,
                    "Input truncated: need {} bytes at offset {}, buffer is {} bytes.",
                    need, offset, len
                )
            }
            SplatError::MalformedRow(e) => {
                write!(f, "Row cannot be decoded: {}", e)
            }
            SplatError::EmptyCloud => {
                write!(f, "The splat cloud is empty.")
            }
            SplatError::Backend(e) => {
                write!(f, "Graphics backend error: {}", e)
            }
            SplatError::IoError(e) => {
                write!(f, "An I/O error occurred: {}", e)
            }
        }
    }
}

impl std::error::Error for SplatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SplatError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
