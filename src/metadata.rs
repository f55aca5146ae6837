//! Micro-Manager `metadata.txt` summary parsing.
//!
//! Three generations of the sidecar schema are understood, selected by the
//! `Summary.MicroManagerVersion` tag:
//!
//! - `1.4.22`: a flat summary block with image size and axis counts.
//! - `*beta*`: image size nested under `Summary.UserData` as strings; no axis counts.
//! - `*gamma*`: image size from the first plane entry, axis counts from the summary.
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

pub const SUMMARY_KEY: &str = "Summary";
pub const VERSION_KEY: &str = "MicroManagerVersion";

/// Schema generation of a Micro-Manager metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaVersion {
    /// Micro-Manager 1.4.22.
    Legacy,
    /// Micro-Manager 2.0 beta.
    Beta,
    /// Micro-Manager 2.0 gamma.
    Gamma,
}

impl SchemaVersion {
    /// Select the schema for a `MicroManagerVersion` tag.
    pub fn from_version_tag(tag: &str) -> Result<Self> {
        if tag == "1.4.22" {
            Ok(Self::Legacy)
        } else if tag.contains("beta") {
            Ok(Self::Beta)
        } else if tag.contains("gamma") {
            Ok(Self::Gamma)
        } else {
            log::error!("Micro-Manager version {tag:?} is not supported");
            Err(Error::UnsupportedSchema(tag.to_string()))
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::Legacy => f.write_str("1.4.22"),
            SchemaVersion::Beta => f.write_str("2.0-beta"),
            SchemaVersion::Gamma => f.write_str("2.0-gamma"),
        }
    }
}

/// Acquisition geometry as declared by one representative metadata document.
///
/// Axis counts are declarations only: an interrupted acquisition may declare
/// more frames than it recorded, and the beta schema declares none at all.
/// See [`crate::coords::DerivedExtents`] for the observed counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionSummary {
    pub width: u64,
    pub height: u64,
    pub frames: u64,
    pub slices: u64,
    pub channels: u64,
    pub z_step_um: Option<f64>,
    pub version: String,
    pub schema: SchemaVersion,
    pub channel_names: Vec<String>,
    pub start_time: Option<String>,
}

impl AcquisitionSummary {
    /// Read the version tag from the summary block and parse accordingly.
    pub fn from_document(document: &Value) -> Result<Self> {
        let summary = field(document, SUMMARY_KEY)?;
        let version = string_field(summary, VERSION_KEY)?;
        Self::parse(document, version)
    }

    /// Parse a document declared to follow the schema named by `version`.
    pub fn parse(document: &Value, version: &str) -> Result<Self> {
        let schema = SchemaVersion::from_version_tag(version)?;
        let summary = field(document, SUMMARY_KEY)?;
        let mut out = Self {
            width: 0,
            height: 0,
            frames: 0,
            slices: 0,
            channels: 0,
            z_step_um: optional_f64(summary, "z-step_um"),
            version: version.to_string(),
            schema,
            channel_names: channel_names(summary),
            start_time: None,
        };
        match schema {
            SchemaVersion::Legacy => {
                out.width = index_field(summary, "Width")?;
                out.height = index_field(summary, "Height")?;
                out.read_axis_counts(summary)?;
            }
            SchemaVersion::Beta => {
                let user_data = field(summary, "UserData")?;
                out.width = index_field(field(user_data, "Width")?, "PropVal")?;
                out.height = index_field(field(user_data, "Height")?, "PropVal")?;
                out.start_time = summary
                    .get("StartTime")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            SchemaVersion::Gamma => {
                (out.width, out.height) = gamma_plane_size(document)?;
                out.read_axis_counts(summary)?;
            }
        }
        Ok(out)
    }

    /// Read and parse a metadata document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_document(&read_document(path)?)
    }

    fn read_axis_counts(&mut self, summary: &Value) -> Result<()> {
        self.frames = index_field(summary, "Frames")?;
        self.slices = index_field(summary, "Slices")?;
        self.channels = index_field(summary, "Channels")?;
        Ok(())
    }
}

/// Gamma documents carry the plane size on the first plane entry,
/// either as an `x-y-width-height` ROI string or as plain fields.
///
/// Only the second and third top-level keys are inspected, in that order.
fn gamma_plane_size(document: &Value) -> Result<(u64, u64)> {
    let keys: Vec<&String> = object(document, "<document>")?.keys().collect();
    if let Some(key) = keys.get(1).filter(|k| k.contains("FrameKey-0-0-0")) {
        let roi = string_field(&document[key.as_str()], "ROI")?;
        let parts: Vec<&str> = roi.split('-').collect();
        let dimension = |idx: usize| -> Result<u64> {
            parts
                .get(idx)
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| {
                    log::error!("ROI string {roi:?} under {key:?} is not x-y-width-height");
                    Error::malformed(format!("{key}.ROI"), format!("invalid ROI string {roi:?}"))
                })
        };
        Ok((dimension(2)?, dimension(3)?))
    } else if let Some(key) = keys.get(2).filter(|k| k.contains("Metadata-")) {
        let entry = &document[key.as_str()];
        Ok((index_field(entry, "Width")?, index_field(entry, "Height")?))
    } else {
        log::error!("gamma metadata has neither a ROI entry nor a plane metadata entry");
        Err(Error::malformed(
            "<plane size>",
            "no FrameKey ROI or Metadata entry in expected position",
        ))
    }
}

fn channel_names(summary: &Value) -> Vec<String> {
    summary
        .get("ChNames")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Read a JSON metadata document.
pub fn read_document(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            log::error!("metadata document {} not found", path.display());
            Error::NoMetadataFound(path.to_path_buf())
        } else {
            log::error!("could not read metadata document {}: {e}", path.display());
            Error::Io(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        log::error!("could not parse metadata document {}: {e}", path.display());
        Error::SerdeJson(e)
    })
}

pub(crate) fn object<'a>(value: &'a Value, name: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        log::error!("metadata entry {name:?} is not an object");
        Error::malformed(name, "expected an object")
    })
}

pub(crate) fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value.get(key).ok_or_else(|| {
        log::error!("metadata key {key:?} not found");
        Error::malformed(key, "missing")
    })
}

fn string_field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    field(value, key)?.as_str().ok_or_else(|| {
        log::error!("metadata key {key:?} is not a string");
        Error::malformed(key, "expected a string")
    })
}

fn index_field(value: &Value, key: &str) -> Result<u64> {
    as_index(field(value, key)?).ok_or_else(|| {
        log::error!("metadata key {key:?} is not a non-negative integer");
        Error::malformed(key, "expected a non-negative integer")
    })
}

fn optional_f64(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerce a JSON number or numeric string to an index.
pub(crate) fn as_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
