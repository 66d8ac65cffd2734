//! Per-datagram decode and fan-out.
//!
//! Each received datagram is decoded, rendered, then handed to three
//! independent sinks in a fixed order: the CSV log, the message bus and the
//! acknowledgment sender. A failing sink never stops the others, and nothing
//! a single datagram does can stop the receive loop.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod sink;
pub mod storage;

#[cfg(feature = "mqtt")]
pub mod bus;

#[cfg(feature = "mqtt")]
pub use bus::MqttBus;
pub use config::{
    AckConfig, BridgeConfig, BusConfig, InboundConfig, QosLevel, StorageConfig,
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_COMMAND_SUFFIX, DEFAULT_KEEP_ALIVE,
    DEFAULT_LOG_FILE, DEFAULT_TOPIC_PREFIX,
};
pub use dispatch::{DispatchContext, DispatchReport, DispatchStats, Dispatcher, SinkOutcome};
pub use error::{Result, SinkError, StartupError};
pub use sink::{AckSink, BusSink, StorageSink};
pub use storage::CsvLog;
