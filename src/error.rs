use std::path::PathBuf;

use crate::coords::{Coordinate, DerivedExtents};
use crate::reader::LayoutKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported data layout: {0}")]
    UnsupportedLayout(String),
    #[error("no built-in reader for the {0} layout")]
    LayoutUnavailable(LayoutKind),
    #[error("unsupported Micro-Manager version: {0}")]
    UnsupportedSchema(String),
    #[error("malformed metadata at `{key}`: {reason}")]
    MalformedMetadata { key: String, reason: String },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("no position subdirectories in {}", .0.display())]
    NoSubdirectories(PathBuf),
    #[error("no metadata document at {}", .0.display())]
    NoMetadataFound(PathBuf),
    #[error("no image coordinates in metadata for position {0:?}")]
    NoCoordinatesFound(String),
    #[error("image coordinate {key:?} has no {field}")]
    MissingCoordinateField { field: &'static str, key: String },
    #[error(
        "image coordinate {key:?} in {directory:?} reports position {reported}, expected {expected}"
    )]
    PositionMismatch {
        key: String,
        directory: String,
        reported: u64,
        expected: u64,
    },
    #[error("no planes found for position {0}")]
    PositionNotFound(u64),
    #[error(
        "coordinate {coordinate} maps to both {} and {}",
        .existing.display(),
        .conflicting.display()
    )]
    CoordinateConflict {
        coordinate: Coordinate,
        existing: PathBuf,
        conflicting: PathBuf,
    },
    #[error("coordinate {coordinate} lies outside the acquisition extents {extents:?}")]
    PlaneOutOfBounds {
        coordinate: Coordinate,
        extents: DerivedExtents,
    },
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
