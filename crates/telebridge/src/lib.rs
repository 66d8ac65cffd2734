//! UDP telemetry bridge for constrained sensor nodes.
//!
//! Nodes send a fixed 14-byte record over UDP. telebridge decodes each one,
//! appends it to a CSV log, republishes it as JSON on an MQTT broker and
//! greets the node back on its acknowledgment port.
//!
//! # Crate Structure
//!
//! - [`record`]: wire layout, field naming profiles, row and JSON rendering
//! - [`transport`]: inbound datagram listener and acknowledgment sender
//! - [`pipeline`]: configuration, sinks and the per-datagram dispatcher

/// Re-export record types.
pub mod record {
    pub use telebridge_record::*;
}

/// Re-export transport types.
pub mod transport {
    pub use telebridge_transport::*;
}

/// Re-export pipeline types. `MqttBus` requires the `mqtt` feature.
pub mod pipeline {
    pub use telebridge_pipeline::*;
}
