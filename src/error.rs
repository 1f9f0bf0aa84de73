use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rslabel operations.
///
/// Variants fall in two groups. Data errors (a bad line, an unknown class, a
/// missing field, an unreadable file) are recovered by the batch engines at
/// box or file granularity. Configuration errors (see [`is_fatal`]) abort the
/// run because the caller asked for something undefined.
///
/// [`is_fatal`]: RslabelError::is_fatal
#[derive(Debug, Error)]
pub enum RslabelError {
    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line {line} in {path}: {message}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Unresolvable class '{class}' in {path}")]
    UnresolvableClass { path: PathBuf, class: String },

    #[error("Missing required field <{field}> in {path}: {message}")]
    MissingRequiredField {
        path: PathBuf,
        field: String,
        message: String,
    },

    #[error("Unsupported conversion from {from} to {to}")]
    UnsupportedFormatPair { from: String, to: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid tile size: {message}")]
    InvalidTileSize { message: String },

    #[error("Tile file name {path} does not end in _<originY>_<originX>")]
    InvalidTileName { path: PathBuf },

    #[error("Failed to parse VOC XML {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("No image found for label file {label_path} (expected {expected})")]
    ImageNotFound {
        label_path: PathBuf,
        expected: PathBuf,
    },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to parse class catalog {path}: {source}")]
    ClassCatalogParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid class catalog {path}: {message}")]
    ClassCatalogInvalid { path: PathBuf, message: String },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl RslabelError {
    /// Returns true for configuration errors that must abort a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RslabelError::UnsupportedFormatPair { .. }
                | RslabelError::UnsupportedFormat(_)
                | RslabelError::InvalidTileSize { .. }
                | RslabelError::ClassCatalogParse { .. }
                | RslabelError::ClassCatalogInvalid { .. }
                | RslabelError::WorkerPool(_)
        )
    }

    pub(crate) fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RslabelError::PathIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_fatal() {
        let err = RslabelError::UnsupportedFormatPair {
            from: "voc".into(),
            to: "dota".into(),
        };
        assert!(err.is_fatal());
        assert!(RslabelError::InvalidTileSize {
            message: "step is zero".into()
        }
        .is_fatal());
    }

    #[test]
    fn io_errors_name_their_path() {
        let err = RslabelError::path_io(
            "labels/a.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "IO error at labels/a.txt: gone");
    }

    #[test]
    fn data_errors_are_recoverable() {
        let err = RslabelError::MalformedLine {
            path: PathBuf::from("a.txt"),
            line: 3,
            message: "expected 8 fields".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Malformed line 3 in a.txt: expected 8 fields"
        );
    }
}
