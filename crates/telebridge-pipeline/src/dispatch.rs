//! Decode and fan out one datagram at a time.
//!
//! ```text
//! Received ─► Decoded ─► Rendered ─┬─► Logged     (if storage enabled)
//!    │                             ├─► Published  (if bus enabled)
//!    ▼                             └─► Acked      (always)
//! Rejected (no sinks, no ack)
//! ```
//!
//! The three sink edges run in that order and each one is attempted no
//! matter how the previous one went. There is no retry.

use std::fmt;
use std::net::SocketAddr;

use serde_json::Value;
use telebridge_record::{
    decode, to_json, to_row, DecodeError, FieldNameProfile, Row, TelemetryRecord,
};
use telebridge_transport::canonical_ip;
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, BusConfig};
use crate::error::SinkError;
use crate::sink::{AckSink, BusSink, StorageSink};

/// Result of one sink edge for one datagram.
#[derive(Debug)]
pub enum SinkOutcome {
    /// The sink accepted the record.
    Done,
    /// The sink is switched off by configuration.
    Disabled,
    /// The sink failed; the failure was logged.
    Failed(SinkError),
}

impl SinkOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SinkOutcome::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SinkOutcome::Failed(_))
    }
}

/// What happened to one datagram.
#[derive(Debug)]
pub enum DispatchReport {
    /// The datagram did not decode. No sink was invoked.
    Rejected(DecodeError),
    /// The datagram decoded and every enabled sink was attempted.
    Dispatched {
        record: TelemetryRecord,
        logged: SinkOutcome,
        published: SinkOutcome,
        acked: SinkOutcome,
    },
}

impl DispatchReport {
    pub fn is_rejected(&self) -> bool {
        matches!(self, DispatchReport::Rejected(_))
    }

    /// The decoded record, if any.
    pub fn record(&self) -> Option<&TelemetryRecord> {
        match self {
            DispatchReport::Rejected(_) => None,
            DispatchReport::Dispatched { record, .. } => Some(record),
        }
    }
}

/// Running totals since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub rejected: u64,
    pub logged: u64,
    pub published: u64,
    pub acked: u64,
    pub storage_failures: u64,
    pub bus_failures: u64,
    pub ack_failures: u64,
}

impl fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} rejected={} logged={} published={} acked={} failures(storage={} bus={} ack={})",
            self.received,
            self.rejected,
            self.logged,
            self.published,
            self.acked,
            self.storage_failures,
            self.bus_failures,
            self.ack_failures
        )
    }
}

/// Everything derived from one accepted datagram. Dropped once the sinks
/// have been attempted.
#[derive(Debug, Clone)]
pub struct DispatchContext<'a> {
    pub sender: SocketAddr,
    /// Canonical sender IP as written to the log.
    pub sender_text: String,
    pub raw: &'a [u8],
    pub record: TelemetryRecord,
    pub row: Row,
    pub json: Value,
}

impl<'a> DispatchContext<'a> {
    /// Render `record` for both the log and the bus.
    pub fn new(
        raw: &'a [u8],
        sender: SocketAddr,
        record: TelemetryRecord,
        profile: FieldNameProfile,
    ) -> Self {
        let sender_text = canonical_ip(sender.ip()).to_string();
        let row = to_row(&sender_text, &record);
        let json = to_json(&record, profile);
        Self {
            sender,
            sender_text,
            raw,
            record,
            row,
            json,
        }
    }
}

/// Drives decode, render and the three sinks for each datagram.
///
/// Owns its sinks exclusively; `handle` takes `&mut self`, so datagrams are
/// processed strictly one after another.
pub struct Dispatcher<S, B, A> {
    storage: Option<S>,
    bus: Option<B>,
    ack: A,
    bus_config: BusConfig,
    profile: FieldNameProfile,
    debug_json: bool,
    stats: DispatchStats,
}

impl<S: StorageSink, B: BusSink, A: AckSink> Dispatcher<S, B, A> {
    /// Build a dispatcher. A sink that is disabled in `config` is dropped
    /// even if one was supplied.
    pub fn new(config: &BridgeConfig, storage: Option<S>, bus: Option<B>, ack: A) -> Self {
        Self {
            storage: storage.filter(|_| config.storage.enabled),
            bus: bus.filter(|_| config.bus.enabled),
            ack,
            bus_config: config.bus.clone(),
            profile: config.profile,
            debug_json: config.debug_json,
            stats: DispatchStats::default(),
        }
    }

    /// Process one datagram. Never fails: every error is logged and
    /// reflected in the returned report and in [`stats`](Self::stats).
    pub fn handle(&mut self, payload: &[u8], sender: SocketAddr) -> DispatchReport {
        self.stats.received += 1;
        info!(%sender, size = payload.len(), "datagram received");

        let record = match decode(payload) {
            Ok(record) => record,
            Err(err) => {
                self.stats.rejected += 1;
                warn!(%sender, size = payload.len(), error = %err, "rejected datagram");
                return DispatchReport::Rejected(err);
            }
        };

        let context = DispatchContext::new(payload, sender, record, self.profile);
        debug!(
            sender = %context.sender_text,
            node_id = record.node_id,
            node_subid = record.node_subid,
            sequence = record.sequence,
            field_1 = record.field_1,
            field_2 = record.field_2,
            field_3 = record.field_3,
            field_4 = record.field_4,
            battery = record.battery,
            "decoded record"
        );
        if self.debug_json {
            match serde_json::to_string_pretty(&context.json) {
                Ok(pretty) => info!("rendered record\n{pretty}"),
                Err(err) => debug!(error = %err, "failed to pretty-print record"),
            }
        }

        let logged = self.log_row(&context);
        let published = self.publish(&context);
        let acked = self.acknowledge(&context);

        DispatchReport::Dispatched {
            record,
            logged,
            published,
            acked,
        }
    }

    /// Account for a datagram the transport dropped because it exceeded the
    /// receive buffer. No sink runs and no acknowledgment is sent.
    pub fn reject_truncated(&mut self, sender: SocketAddr, max_datagram: usize) {
        self.stats.received += 1;
        self.stats.rejected += 1;
        warn!(%sender, max_datagram, "rejected oversized datagram");
    }

    fn log_row(&mut self, context: &DispatchContext<'_>) -> SinkOutcome {
        let Some(storage) = self.storage.as_mut() else {
            return SinkOutcome::Disabled;
        };

        match storage.append(&context.row) {
            Ok(()) => {
                self.stats.logged += 1;
                SinkOutcome::Done
            }
            Err(err) => {
                self.stats.storage_failures += 1;
                warn!(sender = %context.sender_text, error = %err, "failed to log record");
                SinkOutcome::Failed(err)
            }
        }
    }

    fn publish(&mut self, context: &DispatchContext<'_>) -> SinkOutcome {
        let Some(bus) = self.bus.as_mut() else {
            return SinkOutcome::Disabled;
        };

        let topic = self.bus_config.publish_topic(context.record.node_id);
        let result = serde_json::to_vec(&context.json)
            .map_err(|err| SinkError::Bus {
                topic: topic.clone(),
                message: err.to_string(),
            })
            .and_then(|payload| bus.publish(&topic, &payload));

        match result {
            Ok(()) => {
                self.stats.published += 1;
                debug!(%topic, "published record");
                SinkOutcome::Done
            }
            Err(err) => {
                self.stats.bus_failures += 1;
                warn!(
                    sender = %context.sender_text,
                    %topic,
                    error = %err,
                    "failed to publish record"
                );
                SinkOutcome::Failed(err)
            }
        }
    }

    fn acknowledge(&mut self, context: &DispatchContext<'_>) -> SinkOutcome {
        match self.ack.send_ack(context.sender.ip()) {
            Ok(()) => {
                self.stats.acked += 1;
                debug!(sender = %context.sender_text, "acknowledged record");
                SinkOutcome::Done
            }
            Err(err) => {
                self.stats.ack_failures += 1;
                warn!(sender = %context.sender_text, error = %err, "failed to acknowledge record");
                SinkOutcome::Failed(err)
            }
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn storage(&self) -> Option<&S> {
        self.storage.as_ref()
    }

    pub fn bus(&self) -> Option<&B> {
        self.bus.as_ref()
    }

    pub fn bus_mut(&mut self) -> Option<&mut B> {
        self.bus.as_mut()
    }

    pub fn ack(&self) -> &A {
        &self.ack
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::rc::Rc;

    use telebridge_record::{encode, Cell};
    use telebridge_transport::TransportError;

    use super::*;

    const SCENARIO_1: [u8; 14] = [
        0x01, 0x02, 0x00, 0x2A, 0x00, 0x64, 0x00, 0xC8, 0x01, 0x2C, 0x01, 0x90, 0x00, 0x50,
    ];

    #[derive(Debug, Clone, PartialEq)]
    enum Effect {
        Row(Row),
        Publish(String, Value),
        Ack(IpAddr),
    }

    type Journal = Rc<RefCell<Vec<Effect>>>;

    struct FakeStorage {
        journal: Journal,
        fail: bool,
    }

    impl StorageSink for FakeStorage {
        fn append(&mut self, row: &Row) -> crate::Result<()> {
            if self.fail {
                return Err(SinkError::Storage(std::io::Error::other("disk full")));
            }
            self.journal.borrow_mut().push(Effect::Row(row.clone()));
            Ok(())
        }
    }

    struct FakeBus {
        journal: Journal,
        fail: bool,
    }

    impl BusSink for FakeBus {
        fn publish(&mut self, topic: &str, payload: &[u8]) -> crate::Result<()> {
            if self.fail {
                return Err(SinkError::Bus {
                    topic: topic.to_string(),
                    message: "bus not connected".to_string(),
                });
            }
            let value = serde_json::from_slice(payload).expect("payload should be JSON");
            self.journal
                .borrow_mut()
                .push(Effect::Publish(topic.to_string(), value));
            Ok(())
        }
    }

    struct FakeAck {
        journal: Journal,
        fail: bool,
    }

    impl AckSink for FakeAck {
        fn send_ack(&mut self, ip: IpAddr) -> crate::Result<()> {
            if self.fail {
                return Err(SinkError::Reply(TransportError::TimedOut));
            }
            self.journal.borrow_mut().push(Effect::Ack(ip));
            Ok(())
        }
    }

    #[derive(Default, Clone, Copy)]
    struct Failures {
        storage: bool,
        bus: bool,
        ack: bool,
    }

    fn dispatcher(
        config: &BridgeConfig,
        failures: Failures,
    ) -> (Dispatcher<FakeStorage, FakeBus, FakeAck>, Journal) {
        let journal: Journal = Rc::default();
        let dispatcher = Dispatcher::new(
            config,
            Some(FakeStorage {
                journal: journal.clone(),
                fail: failures.storage,
            }),
            Some(FakeBus {
                journal: journal.clone(),
                fail: failures.bus,
            }),
            FakeAck {
                journal: journal.clone(),
                fail: failures.ack,
            },
        );
        (dispatcher, journal)
    }

    fn node_addr() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::new(10, 0, 0, 7), 40000))
    }

    fn record(node_id: u8, sequence: u16) -> TelemetryRecord {
        TelemetryRecord {
            node_id,
            node_subid: 0,
            sequence,
            field_1: 1,
            field_2: 2,
            field_3: 3,
            field_4: 4,
            battery: 3300,
        }
    }

    #[test]
    fn valid_datagram_reaches_every_sink_in_order() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());

        let report = dispatcher.handle(&SCENARIO_1, node_addr());
        match &report {
            DispatchReport::Dispatched {
                logged,
                published,
                acked,
                ..
            } => {
                assert!(logged.is_done());
                assert!(published.is_done());
                assert!(acked.is_done());
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
        assert_eq!(report.record().map(|r| r.sequence), Some(42));

        let journal = journal.borrow();
        assert_eq!(journal.len(), 3);

        let Effect::Row(row) = &journal[0] else {
            panic!("first effect should be the row");
        };
        assert_eq!(row.len(), 9);
        assert_eq!(row[0], Cell::Text("10.0.0.7".to_string()));
        assert_eq!(row[4], Cell::Number(100));
        assert_eq!(row[7], Cell::Number(400));
        assert_eq!(row[8], Cell::Number(80));

        let Effect::Publish(topic, doc) = &journal[1] else {
            panic!("second effect should be the publish");
        };
        assert_eq!(topic, "nodes/info/1");
        assert_eq!(doc["values"].as_array().map(Vec::len), Some(8));
        assert_eq!(doc["values"][1]["value"], 2);

        assert_eq!(journal[2], Effect::Ack(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))));
    }

    #[test]
    fn short_datagram_is_rejected_without_side_effects() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());

        let report = dispatcher.handle(&[0u8; 10], node_addr());
        assert!(matches!(
            report,
            DispatchReport::Rejected(DecodeError::SizeMismatch { actual: 10, .. })
        ));
        assert!(journal.borrow().is_empty(), "no sink and no ack on reject");

        let report = dispatcher.handle(&SCENARIO_1, node_addr());
        assert!(!report.is_rejected(), "next datagram is still processed");
        assert_eq!(journal.borrow().len(), 3);

        let stats = dispatcher.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.acked, 1);
    }

    #[test]
    fn truncated_datagram_counts_as_rejected() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());

        dispatcher.reject_truncated(node_addr(), 14);

        assert!(journal.borrow().is_empty());
        let stats = dispatcher.stats();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.acked, 0);
    }

    #[test]
    fn disabled_bus_skips_publish_only() {
        let mut config = BridgeConfig::default();
        config.bus.enabled = false;
        let (mut dispatcher, journal) = dispatcher(&config, Failures::default());
        assert!(dispatcher.bus().is_none());

        let report = dispatcher.handle(&SCENARIO_1, node_addr());
        let DispatchReport::Dispatched {
            logged,
            published,
            acked,
            ..
        } = report
        else {
            panic!("expected dispatch");
        };
        assert!(logged.is_done());
        assert!(matches!(published, SinkOutcome::Disabled));
        assert!(acked.is_done());

        let journal = journal.borrow();
        assert_eq!(journal.len(), 2);
        assert!(matches!(journal[0], Effect::Row(_)));
        assert!(matches!(journal[1], Effect::Ack(_)));
    }

    #[test]
    fn disabled_storage_skips_row_only() {
        let mut config = BridgeConfig::default();
        config.storage.enabled = false;
        let (mut dispatcher, journal) = dispatcher(&config, Failures::default());

        dispatcher.handle(&SCENARIO_1, node_addr());

        let journal = journal.borrow();
        assert_eq!(journal.len(), 2);
        assert!(matches!(journal[0], Effect::Publish(..)));
        assert!(matches!(journal[1], Effect::Ack(_)));
    }

    #[test]
    fn storage_failure_does_not_block_publish_or_ack() {
        let failures = Failures {
            storage: true,
            ..Failures::default()
        };
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), failures);

        let report = dispatcher.handle(&SCENARIO_1, node_addr());
        let DispatchReport::Dispatched { logged, .. } = report else {
            panic!("expected dispatch");
        };
        assert!(matches!(logged, SinkOutcome::Failed(SinkError::Storage(_))));

        let journal = journal.borrow();
        assert_eq!(journal.len(), 2);
        assert!(matches!(journal[0], Effect::Publish(..)));
        assert!(matches!(journal[1], Effect::Ack(_)));
        assert_eq!(dispatcher.stats().storage_failures, 1);
    }

    #[test]
    fn bus_failure_does_not_block_log_or_ack() {
        let failures = Failures {
            bus: true,
            ..Failures::default()
        };
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), failures);

        let report = dispatcher.handle(&SCENARIO_1, node_addr());
        let DispatchReport::Dispatched { published, .. } = report else {
            panic!("expected dispatch");
        };
        assert!(published.is_failed());

        let journal = journal.borrow();
        assert_eq!(journal.len(), 2);
        assert!(matches!(journal[0], Effect::Row(_)));
        assert!(matches!(journal[1], Effect::Ack(_)));
        assert_eq!(dispatcher.stats().bus_failures, 1);
    }

    #[test]
    fn ack_failure_is_reported_and_next_datagram_proceeds() {
        let failures = Failures {
            ack: true,
            ..Failures::default()
        };
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), failures);

        let first = dispatcher.handle(&SCENARIO_1, node_addr());
        let DispatchReport::Dispatched { acked, logged, .. } = first else {
            panic!("expected dispatch");
        };
        assert!(matches!(acked, SinkOutcome::Failed(SinkError::Reply(_))));
        assert!(logged.is_done());

        dispatcher.handle(&encode(&record(1, 43)), node_addr());

        assert_eq!(journal.borrow().len(), 4, "row and publish for both datagrams");
        let stats = dispatcher.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.logged, 2);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.ack_failures, 2);
    }

    #[test]
    fn datagrams_are_handled_in_arrival_order() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());

        dispatcher.handle(&encode(&record(3, 1)), node_addr());
        dispatcher.handle(&encode(&record(4, 2)), node_addr());

        let journal = journal.borrow();
        let rows: Vec<&Cell> = journal
            .iter()
            .filter_map(|effect| match effect {
                Effect::Row(row) => Some(&row[3]),
                _ => None,
            })
            .collect();
        assert_eq!(rows, [&Cell::Number(1), &Cell::Number(2)]);

        let topics: Vec<&str> = journal
            .iter()
            .filter_map(|effect| match effect {
                Effect::Publish(topic, _) => Some(topic.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(topics, ["nodes/info/3", "nodes/info/4"]);

        // D1's three effects all precede D2's.
        assert!(matches!(journal[2], Effect::Ack(_)));
        assert!(matches!(journal[3], Effect::Row(_)));
    }

    #[test]
    fn profile_and_topic_prefix_come_from_config() {
        let mut config = BridgeConfig {
            profile: FieldNameProfile::Z1,
            ..BridgeConfig::default()
        };
        config.bus.topic_prefix = "lab/".to_string();
        let (mut dispatcher, journal) = dispatcher(&config, Failures::default());

        dispatcher.handle(&encode(&record(9, 1)), node_addr());

        let journal = journal.borrow();
        let Effect::Publish(topic, doc) = &journal[1] else {
            panic!("second effect should be the publish");
        };
        assert_eq!(topic, "lab/9");
        assert_eq!(doc["values"][3]["key"], "temperature");
    }

    #[test]
    fn ipv4_mapped_sender_is_logged_canonically() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());
        let mapped = SocketAddr::from((Ipv4Addr::new(192, 168, 1, 20).to_ipv6_mapped(), 5000));

        dispatcher.handle(&SCENARIO_1, mapped);

        let journal = journal.borrow();
        let Effect::Row(row) = &journal[0] else {
            panic!("first effect should be the row");
        };
        assert_eq!(row[0], Cell::Text("192.168.1.20".to_string()));
    }

    #[test]
    fn ipv6_sender_is_acknowledged_on_its_own_address() {
        let (mut dispatcher, journal) = dispatcher(&BridgeConfig::default(), Failures::default());
        let node = Ipv6Addr::new(0xfd00, 0, 0, 0, 0x212, 0x4b00, 0x615, 0xa4b1);

        dispatcher.handle(&SCENARIO_1, SocketAddr::from((node, 5678)));

        assert_eq!(journal.borrow()[2], Effect::Ack(IpAddr::V6(node)));
    }

    #[test]
    fn debug_json_does_not_change_effects() {
        let config = BridgeConfig {
            debug_json: true,
            ..BridgeConfig::default()
        };
        let (mut dispatcher, journal) = dispatcher(&config, Failures::default());

        dispatcher.handle(&SCENARIO_1, node_addr());
        assert_eq!(journal.borrow().len(), 3);
    }

    #[test]
    fn stats_display_summarizes_counters() {
        let (mut dispatcher, _journal) = dispatcher(&BridgeConfig::default(), Failures::default());
        dispatcher.handle(&SCENARIO_1, node_addr());
        dispatcher.handle(&[1, 2, 3], node_addr());

        assert_eq!(
            dispatcher.stats().to_string(),
            "received=2 rejected=1 logged=1 published=1 acked=1 failures(storage=0 bus=0 ack=0)"
        );
    }
}
