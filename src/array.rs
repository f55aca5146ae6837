//! Assembly of lazily decoded per-position arrays.
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::{Component, Path};
use std::sync::Arc;

use bytes::Bytes;
use ndarray::Array5;
use serde::{Deserialize, Serialize};
use zarrs::{
    array::{
        Array, ArrayMetadataV3, FillValueMetadata,
        chunk_grid::{RegularBoundedChunkGrid, RegularBoundedChunkGridConfiguration},
    },
    metadata::v3::{MetadataV3, NodeMetadataV3},
    plugin::ExtensionAliasesV3,
    storage::{ReadableStorageTraits, StoreKey},
};

use crate::chunk_key_encoding::PlaneChunkKeyEncoding;
use crate::codec::TiffPlaneCodec;
use crate::coords::{CoordinateFileMap, DerivedExtents};
use crate::storage::PlaneStore;
use crate::{Error, Result};

/// A position's planes as a chunked `uint16` array of shape
/// (frames, channels, slices, height, width), decoded on read.
pub type LazyArray = Array<dyn ReadableStorageTraits>;

/// Full extent of an acquisition's per-position arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub frames: u64,
    pub channels: u64,
    pub slices: u64,
    pub height: u64,
    pub width: u64,
}

impl Dimensions {
    pub fn new(extents: DerivedExtents, height: u64, width: u64) -> Self {
        Self {
            frames: extents.frames,
            channels: extents.channels,
            slices: extents.slices,
            height,
            width,
        }
    }

    pub fn extents(&self) -> DerivedExtents {
        DerivedExtents {
            frames: self.frames,
            channels: self.channels,
            slices: self.slices,
        }
    }

    /// Array shape as stored: (frames, channels, slices, height, width).
    pub fn storage_shape(&self) -> [u64; 5] {
        [self.frames, self.channels, self.slices, self.height, self.width]
    }

    /// Shape as reported to callers: (frames, slices, channels, height, width).
    pub fn shape(&self) -> [u64; 5] {
        [self.frames, self.slices, self.channels, self.height, self.width]
    }
}

/// One chunk per plane.
fn convert_chunk_grid(dimensions: &Dimensions) -> Result<MetadataV3> {
    let chunk_shape = [1, 1, 1, dimensions.height, dimensions.width]
        .into_iter()
        .map(|n| NonZeroU64::new(n).ok_or_else(|| Error::malformed("Width/Height", "zero plane size")))
        .collect::<Result<Vec<_>>>()?;
    let out = MetadataV3::new_with_serializable_configuration(
        RegularBoundedChunkGrid::aliases_v3()
            .default_name
            .clone()
            .to_string(),
        &RegularBoundedChunkGridConfiguration { chunk_shape },
    )?;
    Ok(out)
}

fn convert_data_type() -> MetadataV3 {
    MetadataV3::new("uint16".to_string())
}

fn convert_fill_value() -> FillValueMetadata {
    FillValueMetadata::Number(serde_json::Number::from(0))
}

fn convert_chunk_key_encoding() -> MetadataV3 {
    MetadataV3::new(
        PlaneChunkKeyEncoding::aliases_v3()
            .default_name
            .clone()
            .to_string(),
    )
}

fn convert_codec() -> MetadataV3 {
    MetadataV3::new(TiffPlaneCodec::aliases_v3().default_name.clone().to_string())
}

/// Zarr metadata for one position array.
pub fn array_metadata(
    dimensions: &Dimensions,
    attributes: serde_json::Map<String, serde_json::Value>,
) -> Result<ArrayMetadataV3> {
    let out = ArrayMetadataV3::new(
        dimensions.storage_shape().to_vec(),
        convert_chunk_grid(dimensions)?,
        convert_data_type(),
        convert_fill_value(),
        vec![convert_codec()],
    )
    .with_chunk_key_encoding(convert_chunk_key_encoding())
    .with_attributes(attributes);
    Ok(out)
}

/// Store key of `path` relative to the acquisition root.
fn file_key(root: &Path, path: &Path) -> Result<StoreKey> {
    let relative = path.strip_prefix(root).map_err(|_| {
        log::error!(
            "plane file {} is outside the acquisition root {}",
            path.display(),
            root.display()
        );
        Error::general(format!("{} is outside {}", path.display(), root.display()))
    })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => {
                log::error!("plane file path {} is not normalized", path.display());
                return Err(Error::general(format!(
                    "unsupported plane file path {}",
                    path.display()
                )));
            }
        }
    }
    StoreKey::new(parts.join("/")).map_err(Error::wrap)
}

/// Build the array for one position over `inner`, a store rooted at `root`.
///
/// Nothing is decoded here; each plane's file is read when its chunk is.
/// Fails with [`Error::PositionNotFound`] if no plane belongs to `position`.
pub fn build_position_array<R: ReadableStorageTraits + 'static>(
    inner: R,
    root: &Path,
    dimensions: &Dimensions,
    files: &CoordinateFileMap,
    position: u64,
    attributes: serde_json::Map<String, serde_json::Value>,
) -> Result<Arc<LazyArray>> {
    let extents = dimensions.extents();
    let mut planes = HashMap::new();
    for (coordinate, path) in files.position(position) {
        if !extents.contains(coordinate) {
            log::error!("coordinate {coordinate} lies outside {extents:?}");
            return Err(Error::PlaneOutOfBounds {
                coordinate: *coordinate,
                extents,
            });
        }
        log::debug!("plane {coordinate} from {}", path.display());
        planes.insert(
            PlaneChunkKeyEncoding::plane_key(coordinate.time, coordinate.channel, coordinate.z),
            file_key(root, path)?,
        );
    }
    if planes.is_empty() {
        log::error!("no planes recorded for position {position}");
        return Err(Error::PositionNotFound(position));
    }

    let metadata = NodeMetadataV3::Array(array_metadata(dimensions, attributes)?);
    let metadata = Bytes::from_owner(serde_json::to_vec(&metadata)?);
    let store = PlaneStore::new(inner, metadata, planes);
    log::info!(
        "position {position}: {} of {} planes recorded",
        store.num_planes(),
        dimensions.frames * dimensions.channels * dimensions.slices
    );
    let storage: Arc<dyn ReadableStorageTraits> = Arc::new(store);
    Ok(Arc::new(Array::open(storage, "/")?))
}

/// Decode every plane of `array` into memory.
pub fn retrieve_dense(array: &LazyArray) -> Result<Array5<u16>> {
    let shape = array.shape();
    let dim = |i: usize| -> Result<usize> {
        shape
            .get(i)
            .and_then(|&n| usize::try_from(n).ok())
            .ok_or_else(|| Error::general(format!("array shape {shape:?} is not 5-dimensional")))
    };
    let dims = (dim(0)?, dim(1)?, dim(2)?, dim(3)?, dim(4)?);
    let data: Vec<u16> = array.retrieve_array_subset(&array.subset_all())?;
    Ok(Array5::from_shape_vec(dims, data)?)
}
