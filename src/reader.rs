//! Readers presenting an acquisition as per-position 5D arrays.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use ndarray::Array5;
use serde::{Deserialize, Serialize};
use zarrs::filesystem::FilesystemStore;

use crate::array::{Dimensions, LazyArray, build_position_array, retrieve_dense};
use crate::coords::{AcquisitionCoordinates, CoordinateFileMap, DerivedExtents};
use crate::discovery::position_dirs;
use crate::metadata::AcquisitionSummary;
use crate::options::ReaderOptions;
use crate::{Error, Result};

/// How an acquisition's planes are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutKind {
    /// Multi-page containers with embedded metadata (OME-TIFF).
    CombinedFileLayout,
    /// One single-page TIFF per plane, with a JSON sidecar per position.
    PerPlaneFileLayout,
}

impl FromStr for LayoutKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "combinedFileLayout" | "ometiff" => Ok(Self::CombinedFileLayout),
            "perPlaneFileLayout" | "singlepagetiff" => Ok(Self::PerPlaneFileLayout),
            other => {
                log::error!("data layout {other:?} is not recognized");
                Err(Error::UnsupportedLayout(other.to_string()))
            }
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutKind::CombinedFileLayout => f.write_str("combinedFileLayout"),
            LayoutKind::PerPlaneFileLayout => f.write_str("perPlaneFileLayout"),
        }
    }
}

/// Common interface of the readers behind [`MicromanagerReader`].
pub trait AcquisitionReader {
    fn dimensions(&self) -> Dimensions;

    fn position_count(&self) -> usize;

    /// The chunked array for a position, built on first request and cached.
    fn lazy_array(&mut self, position: u64) -> Result<Arc<LazyArray>>;

    /// Every plane of a position, decoded into memory.
    fn dense_array(&mut self, position: u64) -> Result<Array5<u16>> {
        let array = self.lazy_array(position)?;
        retrieve_dense(&array)
    }
}

/// Reader for a folder of position subdirectories, each holding
/// single-page TIFF planes and a `metadata.txt` sidecar.
pub struct SequenceReader {
    root: PathBuf,
    summary: AcquisitionSummary,
    position_names: Vec<String>,
    coordinates: AcquisitionCoordinates,
    dimensions: Dimensions,
    arrays: HashMap<u64, Arc<LazyArray>>,
}

impl SequenceReader {
    pub fn open(folder: impl AsRef<Path>, extract_data: bool) -> Result<Self> {
        Self::open_with_options(
            folder,
            ReaderOptions::default().with_extract_data(extract_data),
        )
    }

    /// Parse the summary from the first position's metadata,
    /// then map every recorded plane of every position to its file.
    pub fn open_with_options(folder: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let root = folder.as_ref().to_path_buf();
        let position_names = position_dirs(&root)?;
        let sample = root.join(&position_names[0]).join(&options.metadata_file);
        let summary = AcquisitionSummary::from_path(&sample)?;
        log::info!(
            "Micro-Manager {} acquisition at {}: {} positions",
            summary.version,
            root.display(),
            position_names.len()
        );

        let coordinates = AcquisitionCoordinates::collect(&root, &position_names, &options)?;
        let extents = coordinates.extents;
        let declared = (summary.frames, summary.channels, summary.slices);
        if declared != (extents.frames, extents.channels, extents.slices) {
            log::warn!(
                "declared (frames, channels, slices) {declared:?} differ from observed {:?}",
                (extents.frames, extents.channels, extents.slices)
            );
        }
        let dimensions = Dimensions::new(extents, summary.height, summary.width);

        let mut out = Self {
            root,
            summary,
            position_names,
            coordinates,
            dimensions,
            arrays: HashMap::new(),
        };
        if options.extract_data {
            out.lazy_array(0)?;
        }
        Ok(out)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn summary(&self) -> &AcquisitionSummary {
        &self.summary
    }

    pub fn extents(&self) -> DerivedExtents {
        self.coordinates.extents
    }

    pub fn coordinates(&self) -> &CoordinateFileMap {
        &self.coordinates.files
    }

    /// Position subdirectory names, in natural order.
    pub fn position_names(&self) -> &[String] {
        &self.position_names
    }

    /// Positions whose arrays have been built.
    pub fn loaded_positions(&self) -> Vec<u64> {
        let mut out: Vec<_> = self.arrays.keys().copied().collect();
        out.sort_unstable();
        out
    }

    fn position_attributes(&self, position: u64) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("position".into(), position.into());
        if let Some(name) = usize::try_from(position)
            .ok()
            .and_then(|p| self.position_names.get(p))
        {
            attributes.insert("position_name".into(), name.clone().into());
        }
        attributes.insert(
            "micromanager_version".into(),
            self.summary.version.clone().into(),
        );
        if !self.summary.channel_names.is_empty() {
            attributes.insert(
                "channel_names".into(),
                self.summary.channel_names.clone().into(),
            );
        }
        attributes
    }
}

impl AcquisitionReader for SequenceReader {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn position_count(&self) -> usize {
        self.position_names.len()
    }

    fn lazy_array(&mut self, position: u64) -> Result<Arc<LazyArray>> {
        if let Some(array) = self.arrays.get(&position) {
            return Ok(array.clone());
        }
        let inner = FilesystemStore::new(&self.root).map_err(Error::wrap)?;
        let array = build_position_array(
            inner,
            &self.root,
            &self.dimensions,
            &self.coordinates.files,
            position,
            self.position_attributes(position),
        )?;
        self.arrays.insert(position, array.clone());
        Ok(array)
    }
}

/// Entry point selecting a reader by data layout.
pub struct MicromanagerReader {
    reader: Box<dyn AcquisitionReader>,
}

impl MicromanagerReader {
    /// Open `src` with the built-in reader for `layout`.
    ///
    /// The combined-file layout has no built-in reader;
    /// construct one externally and use [`MicromanagerReader::from_reader`].
    pub fn open(src: impl AsRef<Path>, layout: &str, extract_data: bool) -> Result<Self> {
        match layout.parse::<LayoutKind>()? {
            LayoutKind::PerPlaneFileLayout => Ok(Self::from_reader(Box::new(
                SequenceReader::open(src, extract_data)?,
            ))),
            kind @ LayoutKind::CombinedFileLayout => {
                log::error!("no built-in reader for the {kind} layout");
                Err(Error::LayoutUnavailable(kind))
            }
        }
    }

    pub fn from_reader(reader: Box<dyn AcquisitionReader>) -> Self {
        Self { reader }
    }

    /// (frames, slices, channels, height, width).
    pub fn shape(&self) -> [u64; 5] {
        self.reader.dimensions().shape()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.reader.dimensions()
    }

    pub fn position_count(&self) -> usize {
        self.reader.position_count()
    }

    pub fn lazy_array(&mut self, position: u64) -> Result<Arc<LazyArray>> {
        self.reader.lazy_array(position)
    }

    pub fn dense_array(&mut self, position: u64) -> Result<Array5<u16>> {
        self.reader.dense_array(position)
    }
}
