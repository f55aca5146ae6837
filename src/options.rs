use serde::{Deserialize, Serialize};

/// How to treat one coordinate mapping to two different files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateCoordinates {
    /// Fail with [`crate::Error::CoordinateConflict`].
    #[default]
    Reject,
    /// Keep the file seen last, in position directory order.
    LastWins,
}

/// Options for opening a single-page TIFF sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderOptions {
    /// Build the array for position 0 while opening.
    pub extract_data: bool,
    /// Name of the JSON sidecar inside each position directory.
    pub metadata_file: String,
    pub duplicate_coordinates: DuplicateCoordinates,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            extract_data: false,
            metadata_file: "metadata.txt".to_string(),
            duplicate_coordinates: DuplicateCoordinates::default(),
        }
    }
}

impl ReaderOptions {
    pub fn with_extract_data(mut self, extract_data: bool) -> Self {
        self.extract_data = extract_data;
        self
    }

    pub fn with_metadata_file(mut self, metadata_file: impl Into<String>) -> Self {
        self.metadata_file = metadata_file.into();
        self
    }

    pub fn with_duplicate_coordinates(mut self, policy: DuplicateCoordinates) -> Self {
        self.duplicate_coordinates = policy;
        self
    }
}
