//! Fixed-layout telemetry records sent by sensor nodes.
//!
//! Every datagram is exactly 14 bytes, big-endian, with no padding:
//! - `node_id` (1) and `node_subid` (1)
//! - `sequence` (2)
//! - four instrument readings `field_1..field_4` (2 each)
//! - `battery` (2)
//!
//! Anything of another length is rejected, never partially decoded.

pub mod codec;
pub mod error;
pub mod profile;
pub mod render;

pub use codec::{decode, encode, TelemetryRecord, RECORD_SIZE};
pub use error::{DecodeError, Result};
pub use profile::{FieldNameProfile, UnknownProfile};
pub use render::{header_row, to_json, to_row, Cell, Row, ROW_WIDTH};
