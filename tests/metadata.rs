use mmseq::{AcquisitionSummary, Error, SchemaVersion};
use serde_json::json;

fn init() {
    env_logger::try_init().ok();
}

#[test]
fn test_legacy_summary() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "1.4.22",
            "Width": 2048,
            "Height": 1024,
            "Frames": 50,
            "Slices": 5,
            "Channels": 3,
            "z-step_um": 1.5,
            "ChNames": ["BF", "GFP", "RFP"],
        },
        "FrameKey-0-0-0": {"FileName": "img_000000000_BF_000.tif"},
    });
    let summary = AcquisitionSummary::from_document(&doc).expect("parse");
    assert_eq!(summary.schema, SchemaVersion::Legacy);
    assert_eq!((summary.width, summary.height), (2048, 1024));
    assert_eq!((summary.frames, summary.slices, summary.channels), (50, 5, 3));
    assert_eq!(summary.z_step_um, Some(1.5));
    assert_eq!(summary.channel_names, ["BF", "GFP", "RFP"]);
}

#[test]
fn test_beta_summary_coerces_strings() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "2.0.0-beta3 20180923",
            "UserData": {
                "Width": {"PropVal": "2048"},
                "Height": {"PropVal": "2048"},
            },
            "StartTime": "2018-10-01 12:00:00.000 -0700",
        },
    });
    let summary = AcquisitionSummary::from_document(&doc).expect("parse");
    assert_eq!(summary.schema, SchemaVersion::Beta);
    assert_eq!((summary.width, summary.height), (2048, 2048));
    // beta documents declare no axis counts
    assert_eq!((summary.frames, summary.slices, summary.channels), (0, 0, 0));
    assert_eq!(
        summary.start_time.as_deref(),
        Some("2018-10-01 12:00:00.000 -0700")
    );
}

#[test]
fn test_gamma_summary_from_roi() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "2.0.0-gamma1 20200514",
            "Frames": 4,
            "Slices": 2,
            "Channels": 1,
        },
        "FrameKey-0-0-0": {"ROI": "0-0-512-256"},
    });
    let summary = AcquisitionSummary::from_document(&doc).expect("parse");
    assert_eq!(summary.schema, SchemaVersion::Gamma);
    assert_eq!((summary.width, summary.height), (512, 256));
    assert_eq!((summary.frames, summary.slices, summary.channels), (4, 2, 1));
    assert_eq!(summary.z_step_um, None);
}

#[test]
fn test_gamma_summary_from_plane_metadata() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "2.0.0-gamma1",
            "Frames": 1,
            "Slices": 3,
            "Channels": 2,
        },
        "Coords-Default/img_channel000_position000_time000000000_z000.tif": {
            "ChannelIndex": 0,
        },
        "Metadata-Default/img_channel000_position000_time000000000_z000.tif": {
            "Width": 640,
            "Height": 480,
        },
    });
    let summary = AcquisitionSummary::from_document(&doc).expect("parse");
    assert_eq!((summary.width, summary.height), (640, 480));
    assert_eq!((summary.frames, summary.slices, summary.channels), (1, 3, 2));
}

#[test]
fn test_gamma_summary_without_plane_size() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "2.0.0-gamma1",
            "Frames": 1,
            "Slices": 1,
            "Channels": 1,
        },
    });
    let err = AcquisitionSummary::from_document(&doc).unwrap_err();
    assert!(matches!(err, Error::MalformedMetadata { .. }), "{err}");
}

#[test]
fn test_unsupported_version() {
    init();
    for version in ["1.4.23", "2.0.1", ""] {
        let doc = json!({"Summary": {"MicroManagerVersion": version}});
        match AcquisitionSummary::from_document(&doc) {
            Err(Error::UnsupportedSchema(v)) => assert_eq!(v, version),
            other => panic!("expected UnsupportedSchema, got {other:?}"),
        }
    }
}

#[test]
fn test_explicit_version_overrides_document() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "unknown",
            "Width": 8,
            "Height": 6,
            "Frames": 1,
            "Slices": 1,
            "Channels": 1,
        },
    });
    let summary = AcquisitionSummary::parse(&doc, "1.4.22").expect("parse");
    assert_eq!(summary.version, "1.4.22");
    assert_eq!((summary.width, summary.height), (8, 6));
}

#[test]
fn test_missing_field_is_named() {
    init();
    let doc = json!({
        "Summary": {
            "MicroManagerVersion": "1.4.22",
            "Width": 8,
            "Height": 6,
            "Frames": 1,
            "Channels": 1,
        },
    });
    match AcquisitionSummary::from_document(&doc) {
        Err(Error::MalformedMetadata { key, .. }) => assert_eq!(key, "Slices"),
        other => panic!("expected MalformedMetadata, got {other:?}"),
    }
}

#[test]
fn test_missing_summary() {
    init();
    let err = AcquisitionSummary::from_document(&json!({})).unwrap_err();
    match err {
        Error::MalformedMetadata { key, .. } => assert_eq!(key, "Summary"),
        other => panic!("expected MalformedMetadata, got {other:?}"),
    }
}
