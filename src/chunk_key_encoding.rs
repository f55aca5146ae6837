use zarrs::{
    array::{
        ChunkKeyEncoding, ChunkKeyEncodingTraits,
        chunk_key_encoding::{self as cke, api::ChunkKeyEncodingPlugin},
    },
    plugin::PluginConfigurationInvalidError,
    storage::StoreKey,
};

/// Keys each (t, c, z, y, x) chunk of a position array as `plane/{t}/{c}/{z}`.
///
/// Chunks span a whole plane, so the spatial grid indices are always zero
/// and are left out of the key.
#[derive(Debug, Clone, Copy)]
pub struct PlaneChunkKeyEncoding;

pub const PLANE_PREFIX: &str = "plane/";

zarrs::plugin::impl_extension_aliases!(PlaneChunkKeyEncoding, v3: "zarrs.mm_plane", ["zarrs.mm_plane", "mm_plane"]);
inventory::submit! {
    ChunkKeyEncodingPlugin::new::<PlaneChunkKeyEncoding>()
}

impl PlaneChunkKeyEncoding {
    /// Store key of the plane at (time, channel, z).
    pub fn plane_key(time: u64, channel: u64, z: u64) -> StoreKey {
        StoreKey::new(format!("{PLANE_PREFIX}{time}/{channel}/{z}"))
            .expect("plane key should be valid")
    }
}

impl ChunkKeyEncodingTraits for PlaneChunkKeyEncoding {
    fn create(
        metadata: &zarrs::metadata::v3::MetadataV3,
    ) -> Result<cke::api::ChunkKeyEncoding, zarrs::plugin::PluginCreateError>
    where
        Self: Sized,
    {
        let cke = match metadata.name() {
            "zarrs.mm_plane" | "mm_plane" => ChunkKeyEncoding::new(Self),
            _ => {
                return Err(zarrs::plugin::PluginCreateError::NameInvalid {
                    name: metadata.name().into(),
                });
            }
        };
        if !metadata.configuration_is_none_or_empty() {
            return Err(zarrs::plugin::PluginCreateError::ConfigurationInvalid(
                PluginConfigurationInvalidError::new(
                    "plane chunk key encoding does not support configuration".into(),
                ),
            ));
        }
        Ok(cke)
    }

    fn configuration(&self) -> zarrs::metadata::Configuration {
        Default::default()
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey {
        let index = |i: usize| chunk_grid_indices.get(i).copied().unwrap_or(0);
        Self::plane_key(index(0), index(1), index(2))
    }
}
