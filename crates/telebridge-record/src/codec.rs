use bytes::{Buf, BufMut};

use crate::error::{DecodeError, Result};

/// Wire size of one record: 1 + 1 + 2 + 2 + 2 + 2 + 2 + 2 bytes.
pub const RECORD_SIZE: usize = 14;

/// One decoded telemetry datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TelemetryRecord {
    /// Reporting node. Also the bus topic suffix.
    pub node_id: u8,
    /// Channel on the reporting node.
    pub node_subid: u8,
    /// Per-node counter. Not checked for gaps.
    pub sequence: u16,
    pub field_1: u16,
    pub field_2: u16,
    pub field_3: u16,
    pub field_4: u16,
    pub battery: u16,
}

impl TelemetryRecord {
    /// The four instrument readings in slot order.
    pub fn fields(&self) -> [u16; 4] {
        [self.field_1, self.field_2, self.field_3, self.field_4]
    }
}

/// Decode a datagram into a record.
///
/// Wire format (all big-endian, packed):
/// ```text
/// ┌────┬──────┬──────────┬─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ id │ id2  │ sequence │ field_1 │ field_2 │ field_3 │ field_4 │ battery │
/// │ 1B │ 1B   │ 2B       │ 2B      │ 2B      │ 2B      │ 2B      │ 2B      │
/// └────┴──────┴──────────┴─────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// Every bit pattern of the right length is a valid record; there is no range
/// check on sensor values.
pub fn decode(mut src: &[u8]) -> Result<TelemetryRecord> {
    if src.len() != RECORD_SIZE {
        return Err(DecodeError::SizeMismatch {
            actual: src.len(),
            expected: RECORD_SIZE,
        });
    }

    Ok(TelemetryRecord {
        node_id: src.get_u8(),
        node_subid: src.get_u8(),
        sequence: src.get_u16(),
        field_1: src.get_u16(),
        field_2: src.get_u16(),
        field_3: src.get_u16(),
        field_4: src.get_u16(),
        battery: src.get_u16(),
    })
}

/// Encode a record into its wire format. Exact inverse of [`decode`].
pub fn encode(record: &TelemetryRecord) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    let mut dst = &mut out[..];
    dst.put_u8(record.node_id);
    dst.put_u8(record.node_subid);
    dst.put_u16(record.sequence);
    dst.put_u16(record.field_1);
    dst.put_u16(record.field_2);
    dst.put_u16(record.field_3);
    dst.put_u16(record.field_4);
    dst.put_u16(record.battery);
    out
}
