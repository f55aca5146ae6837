use std::collections::HashMap;

use bytes::Bytes;
use zarrs::storage::{
    MaybeBytes, MaybeBytesIterator, ReadableStorageTraits, StorageError, StoreKey,
    byte_range::{ByteRange, ByteRangeIterator},
};

/// Read-only view of one position as a Zarr array.
///
/// Serves synthesized `zarr.json` metadata, and forwards each plane chunk key
/// to the single-page TIFF file in `inner` which holds that plane.
/// Planes with no file are absent, and read as the fill value.
pub struct PlaneStore<R> {
    inner: R,
    metadata: Bytes,
    planes: HashMap<StoreKey, StoreKey>,
}

impl<R> PlaneStore<R> {
    /// `metadata` is the serialized array metadata;
    /// `planes` maps plane chunk keys to file keys in `inner`.
    pub fn new(inner: R, metadata: Bytes, planes: HashMap<StoreKey, StoreKey>) -> Self {
        Self {
            inner,
            metadata,
            planes,
        }
    }

    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    fn is_metadata_key(key: &StoreKey) -> bool {
        key.as_str() == "zarr.json"
    }
}

impl<R: ReadableStorageTraits> ReadableStorageTraits for PlaneStore<R> {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        if Self::is_metadata_key(key) {
            Ok(Some(self.metadata.len() as u64))
        } else if let Some(file) = self.planes.get(key) {
            self.inner.size_key(file)
        } else {
            Ok(None)
        }
    }

    fn supports_get_partial(&self) -> bool {
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        if Self::is_metadata_key(key) {
            Ok(Some(self.metadata.clone()))
        } else if let Some(file) = self.planes.get(key) {
            log::trace!("reading plane {} from {}", key.as_str(), file.as_str());
            self.inner.get(file)
        } else {
            Ok(None)
        }
    }

    fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }
}
