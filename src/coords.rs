//! Mapping from image coordinates to the files holding each plane.
use std::collections::{BTreeSet, HashMap, hash_map::Entry};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::{as_index, object, read_document};
use crate::options::{DuplicateCoordinates, ReaderOptions};
use crate::{Error, Result};

/// Location of one 2D plane: (position, time, channel, z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub position: u64,
    pub time: u64,
    pub channel: u64,
    pub z: u64,
}

impl Coordinate {
    pub fn new(position: u64, time: u64, channel: u64, z: u64) -> Self {
        Self {
            position,
            time,
            channel,
            z,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(p={}, t={}, c={}, z={})",
            self.position, self.time, self.channel, self.z
        )
    }
}

/// Role of a top-level key in a metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass<'a> {
    /// Gamma plane coordinates, `Coords-<plane>`.
    Coords { plane: &'a str },
    /// Gamma plane file metadata, `Metadata-<plane>`.
    FileMetadata { plane: &'a str },
    /// Legacy combined coordinates and file name, `FrameKey-t-c-z`.
    FrameKey,
    Other,
}

impl<'a> KeyClass<'a> {
    pub fn of(key: &'a str) -> Self {
        let plane = || key.split_once('-').map_or("", |(_, rest)| rest);
        if key.contains("Coords") {
            Self::Coords { plane: plane() }
        } else if key.contains("Metadata") {
            Self::FileMetadata { plane: plane() }
        } else if key.contains("FrameKey") {
            Self::FrameKey
        } else {
            Self::Other
        }
    }
}

/// Top-level keys of one metadata document, classified once.
#[derive(Debug, Default)]
pub struct DocumentKeys<'a> {
    /// Keys carrying plane coordinates, in document order.
    pub coordinates: Vec<&'a str>,
    /// Plane identifier to `Metadata-*` key.
    pub file_metadata: HashMap<&'a str, &'a str>,
}

impl<'a> DocumentKeys<'a> {
    pub fn classify(document: &'a Value) -> Result<Self> {
        let mut out = Self::default();
        for key in object(document, "<document>")?.keys() {
            match KeyClass::of(key) {
                KeyClass::Coords { .. } | KeyClass::FrameKey => out.coordinates.push(key),
                KeyClass::FileMetadata { plane } => {
                    out.file_metadata.insert(plane, key);
                }
                KeyClass::Other => {}
            }
        }
        Ok(out)
    }

    /// The `Metadata-*` entry describing the same plane as a coordinate key, if any.
    fn paired_metadata(&self, coordinate_key: &str) -> Option<&'a str> {
        match KeyClass::of(coordinate_key) {
            KeyClass::Coords { plane } => self.file_metadata.get(plane).copied(),
            _ => None,
        }
    }
}

/// Plane counts observed along each non-spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DerivedExtents {
    pub frames: u64,
    pub channels: u64,
    pub slices: u64,
}

impl DerivedExtents {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.time < self.frames
            && coordinate.channel < self.channels
            && coordinate.z < self.slices
    }
}

/// Absolute path of the file holding each plane of an acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateFileMap {
    inner: HashMap<Coordinate, PathBuf>,
}

impl CoordinateFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&Path> {
        self.inner.get(coordinate).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, &Path)> {
        self.inner.iter().map(|(c, p)| (c, p.as_path()))
    }

    /// Planes belonging to one position.
    pub fn position(&self, position: u64) -> impl Iterator<Item = (&Coordinate, &Path)> {
        self.iter().filter(move |(c, _)| c.position == position)
    }

    /// Add a plane.
    ///
    /// Re-inserting the same file for a coordinate is a no-op.
    /// A different file for an existing coordinate is resolved by `policy`.
    pub fn insert(
        &mut self,
        coordinate: Coordinate,
        path: PathBuf,
        policy: DuplicateCoordinates,
    ) -> Result<()> {
        match self.inner.entry(coordinate) {
            Entry::Vacant(e) => {
                e.insert(path);
            }
            Entry::Occupied(e) if e.get() == &path => {}
            Entry::Occupied(mut e) => match policy {
                DuplicateCoordinates::Reject => {
                    log::error!(
                        "coordinate {coordinate} already maps to {}, refusing {}",
                        e.get().display(),
                        path.display()
                    );
                    return Err(Error::CoordinateConflict {
                        coordinate,
                        existing: e.get().clone(),
                        conflicting: path,
                    });
                }
                DuplicateCoordinates::LastWins => {
                    log::warn!(
                        "coordinate {coordinate} remapped from {} to {}",
                        e.get().display(),
                        path.display()
                    );
                    e.insert(path);
                }
            },
        }
        Ok(())
    }

    /// Union of two maps; `other` is merged in after `self`.
    pub fn merge(mut self, other: Self, policy: DuplicateCoordinates) -> Result<Self> {
        let mut entries: Vec<_> = other.inner.into_iter().collect();
        entries.sort_unstable_by_key(|(c, _)| *c);
        for (coordinate, path) in entries {
            self.insert(coordinate, path, policy)?;
        }
        Ok(self)
    }

    /// Number of distinct time, channel and z indices present.
    pub fn extents(&self) -> DerivedExtents {
        let mut frames = BTreeSet::new();
        let mut channels = BTreeSet::new();
        let mut slices = BTreeSet::new();
        for c in self.inner.keys() {
            frames.insert(c.time);
            channels.insert(c.channel);
            slices.insert(c.z);
        }
        for (axis, values) in [("time", &frames), ("channel", &channels), ("z", &slices)] {
            if let Some(max) = values.last() {
                if *max + 1 != values.len() as u64 {
                    log::warn!(
                        "{axis} indices are sparse: {} distinct values up to {max}",
                        values.len()
                    );
                }
            }
        }
        DerivedExtents {
            frames: frames.len() as u64,
            channels: channels.len() as u64,
            slices: slices.len() as u64,
        }
    }
}

/// Map every plane recorded in one position's metadata document to its file.
///
/// Gamma documents pair each `Coords-*` entry with a `Metadata-*` entry whose
/// `FileName` is already relative to `root`.
/// Legacy entries hold a bare `FileName`, which is placed under `position_dir`.
/// Their `PositionIndex` must equal `position`, the directory's natural-order ordinal,
/// since the file path is built from that directory.
pub fn extract_coordinates(
    document: &Value,
    root: &Path,
    position_dir: &str,
    position: u64,
    policy: DuplicateCoordinates,
) -> Result<CoordinateFileMap> {
    let keys = DocumentKeys::classify(document)?;
    if keys.coordinates.is_empty() {
        log::error!("metadata for position {position_dir:?} references no images");
        return Err(Error::NoCoordinatesFound(position_dir.to_string()));
    }

    let mut out = CoordinateFileMap::new();
    for key in keys.coordinates.iter().copied() {
        let entry = &document[key];
        let coordinate = Coordinate {
            position: coordinate_field(entry, key, "PositionIndex")?,
            time: coordinate_field(entry, key, "FrameIndex")?,
            channel: coordinate_field(entry, key, "ChannelIndex")?,
            z: coordinate_field(entry, key, "SliceIndex")?,
        };

        let relative = match keys.paired_metadata(key) {
            Some(meta_key) => PathBuf::from(file_name(&document[meta_key], meta_key)?),
            None => {
                if coordinate.position != position {
                    log::error!(
                        "image coordinate {key:?} in {position_dir:?} reports position {}, expected {position}",
                        coordinate.position
                    );
                    return Err(Error::PositionMismatch {
                        key: key.to_string(),
                        directory: position_dir.to_string(),
                        reported: coordinate.position,
                        expected: position,
                    });
                }
                Path::new(position_dir).join(file_name(entry, key)?)
            }
        };
        let path = root.join(relative);
        log::debug!("coordinate {coordinate} -> {}", path.display());
        out.insert(coordinate, path, policy)?;
    }
    Ok(out)
}

fn coordinate_field(entry: &Value, key: &str, field: &'static str) -> Result<u64> {
    entry.get(field).and_then(as_index).ok_or_else(|| {
        log::error!("image coordinate {key:?} has no valid {field}");
        Error::MissingCoordinateField {
            field,
            key: key.to_string(),
        }
    })
}

fn file_name<'a>(entry: &'a Value, key: &str) -> Result<&'a str> {
    entry.get("FileName").and_then(Value::as_str).ok_or_else(|| {
        log::error!("metadata for image coordinate {key:?} has no FileName");
        Error::MissingCoordinateField {
            field: "FileName",
            key: key.to_string(),
        }
    })
}

/// Coordinates of a whole acquisition, gathered from every position directory.
#[derive(Debug, Clone)]
pub struct AcquisitionCoordinates {
    pub files: CoordinateFileMap,
    pub extents: DerivedExtents,
}

impl AcquisitionCoordinates {
    /// Extract and union the coordinates of each position directory under `root`.
    pub fn collect(root: &Path, positions: &[String], options: &ReaderOptions) -> Result<Self> {
        let policy = options.duplicate_coordinates;
        let files = positions.iter().zip(0u64..).try_fold(
            CoordinateFileMap::new(),
            |acc, (position, ordinal)| {
                let path = root.join(position).join(&options.metadata_file);
                let document = read_document(&path)?;
                let partial = extract_coordinates(&document, root, position, ordinal, policy)?;
                log::debug!("position {position:?}: {} planes", partial.len());
                acc.merge(partial, policy)
            },
        )?;
        let extents = files.extents();
        Ok(Self { files, extents })
    }
}
