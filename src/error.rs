use std::path::PathBuf;

/// Failures that abort the conversion of a single Flexfile.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("error accessing file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: CsvError) -> Self {
        ConvertError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Malformed CSV input.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error(transparent)]
    Read(#[from] csv::Error),
    #[error("line {line}: {reason}")]
    Quote { line: u64, reason: &'static str },
}
