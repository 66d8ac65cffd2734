//! Seams between the dispatcher and its three downstream effects.

use std::net::IpAddr;

use telebridge_record::Row;
use telebridge_transport::ReplySender;

use crate::error::{Result, SinkError};

/// Durable row log.
pub trait StorageSink {
    /// Append one rendered row.
    fn append(&mut self, row: &Row) -> Result<()>;
}

/// Publish side of the message bus.
pub trait BusSink {
    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Acknowledgment back to the node that sent a record.
pub trait AckSink {
    fn send_ack(&mut self, ip: IpAddr) -> Result<()>;
}

impl AckSink for ReplySender {
    fn send_ack(&mut self, ip: IpAddr) -> Result<()> {
        ReplySender::send_ack(self, ip).map_err(SinkError::Reply)
    }
}
