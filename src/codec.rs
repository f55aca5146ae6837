use std::borrow::Cow;
use std::sync::Arc;

use image::DynamicImage;
use zarrs::array::CodecChain;
use zarrs::array::codec::BytesCodec;
use zarrs::metadata::v3::MetadataV3;
use zarrs::plugin::{PluginConfigurationInvalidError, PluginCreateError};
use zarrs_codec::{
    ArrayCodecTraits, ArrayToBytesCodecTraits, Codec, CodecError, CodecPluginV3, CodecTraits,
    CodecTraitsV3,
};

zarrs::plugin::impl_extension_aliases!(TiffPlaneCodec, v3: "zarrs.tiff_plane", ["zarrs.tiff_plane", "tiff_plane"]);
inventory::submit! {
    CodecPluginV3::new::<TiffPlaneCodec>()
}

/// Decodes a single-page grayscale TIFF file into one `uint16` plane chunk.
///
/// 8-bit images are widened without rescaling.
#[derive(Debug, Clone)]
pub struct TiffPlaneCodec {
    /// Little-endian bytes codec applied to the decoded pixels.
    codecs: CodecChain,
}

impl Default for TiffPlaneCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffPlaneCodec {
    pub fn new() -> Self {
        Self {
            codecs: CodecChain::new(vec![], Arc::new(BytesCodec::little()), vec![]),
        }
    }
}

/// Decode a TIFF image to row-major `u16` pixels with its (width, height).
pub fn decode_plane(bytes: &[u8]) -> Result<(u32, u32, Vec<u16>), CodecError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Tiff)
        .map_err(|e| CodecError::Other(format!("TIFF plane could not be decoded: {e}")))?;
    let (width, height) = (image.width(), image.height());
    let pixels = match image {
        DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u16::from).collect(),
        other => {
            return Err(CodecError::Other(format!(
                "unsupported TIFF pixel format: {:?}",
                other.color()
            )));
        }
    };
    Ok((width, height, pixels))
}

impl CodecTraitsV3 for TiffPlaneCodec {
    fn create(metadata: &MetadataV3) -> Result<Codec, PluginCreateError>
    where
        Self: Sized,
    {
        if !metadata.configuration_is_none_or_empty() {
            return Err(PluginCreateError::ConfigurationInvalid(
                PluginConfigurationInvalidError::new(
                    "TIFF plane codec does not support configuration".into(),
                ),
            ));
        }
        Ok(Codec::ArrayToBytes(Arc::new(TiffPlaneCodec::new())))
    }
}

impl CodecTraits for TiffPlaneCodec {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn configuration(
        &self,
        _version: zarrs::plugin::ZarrVersion,
        _options: &zarrs_codec::CodecMetadataOptions,
    ) -> Option<zarrs::metadata::Configuration> {
        Some(Default::default())
    }

    fn partial_decoder_capability(&self) -> zarrs_codec::PartialDecoderCapability {
        zarrs_codec::PartialDecoderCapability {
            partial_read: false,
            partial_decode: false,
        }
    }

    fn partial_encoder_capability(&self) -> zarrs_codec::PartialEncoderCapability {
        zarrs_codec::PartialEncoderCapability {
            partial_encode: false,
        }
    }
}

impl ArrayCodecTraits for TiffPlaneCodec {
    fn recommended_concurrency(
        &self,
        _shape: &[std::num::NonZeroU64],
        _data_type: &zarrs::array::DataType,
    ) -> Result<zarrs_codec::RecommendedConcurrency, zarrs_codec::CodecError> {
        Ok(zarrs_codec::RecommendedConcurrency::new_maximum(1))
    }
}

impl ArrayToBytesCodecTraits for TiffPlaneCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn ArrayToBytesCodecTraits> {
        self
    }

    fn encoded_representation(
        &self,
        _shape: &[std::num::NonZeroU64],
        _data_type: &zarrs::array::DataType,
        _fill_value: &zarrs::array::FillValue,
    ) -> Result<zarrs_codec::BytesRepresentation, zarrs_codec::CodecError> {
        Ok(zarrs_codec::BytesRepresentation::UnboundedSize)
    }

    fn encode<'a>(
        &self,
        _bytes: zarrs_codec::ArrayBytes<'a>,
        _shape: &[std::num::NonZeroU64],
        _data_type: &zarrs::array::DataType,
        _fill_value: &zarrs::array::FillValue,
        _options: &zarrs_codec::CodecOptions,
    ) -> Result<zarrs_codec::ArrayBytesRaw<'a>, zarrs_codec::CodecError> {
        Err(zarrs_codec::CodecError::Other(
            "encoding not supported".into(),
        ))
    }

    fn decode<'a>(
        &self,
        bytes: zarrs_codec::ArrayBytesRaw<'a>,
        shape: &[std::num::NonZeroU64],
        data_type: &zarrs::array::DataType,
        fill_value: &zarrs::array::FillValue,
        options: &zarrs_codec::CodecOptions,
    ) -> Result<zarrs_codec::ArrayBytes<'a>, zarrs_codec::CodecError> {
        let (width, height, pixels) = decode_plane(&bytes)?;

        // chunks are (1, 1, 1, height, width)
        let expected: Vec<u64> = shape.iter().rev().take(2).map(|n| n.get()).collect();
        if expected != [u64::from(width), u64::from(height)] {
            return Err(CodecError::Other(format!(
                "TIFF plane is {width}x{height}, expected chunk shape {shape:?}"
            )));
        }

        let raw: Vec<u8> = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.codecs
            .decode(Cow::Owned(raw), shape, data_type, fill_value, options)
    }
}
