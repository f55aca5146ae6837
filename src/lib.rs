pub mod array;
pub mod chunk_key_encoding;
pub mod codec;
pub mod coords;
pub mod discovery;
mod error;
pub mod metadata;
pub mod options;
pub mod reader;
pub mod storage;

pub use zarrs;

pub use array::{Dimensions, LazyArray};
pub use coords::{Coordinate, CoordinateFileMap, DerivedExtents};
pub use error::{Error, Result};
pub use metadata::{AcquisitionSummary, SchemaVersion};
pub use options::{DuplicateCoordinates, ReaderOptions};
pub use reader::{AcquisitionReader, LayoutKind, MicromanagerReader, SequenceReader};
