use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::RangedU64ValueParser;
use clap::{Args, Subcommand};
use telebridge_record::{FieldNameProfile, RECORD_SIZE};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive node datagrams and fan them out to the log, the bus and the ack port.
    Serve(ServeArgs),
    /// Send one record datagram, the way a node does.
    Send(SendArgs),
    /// Decode a hex datagram and print the record.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Local address to bind. `::` also accepts IPv4.
    #[arg(long, env = "TELEBRIDGE_BIND", default_value = "::")]
    pub bind: IpAddr,
    /// Inbound telemetry port.
    #[arg(long, env = "TELEBRIDGE_PORT", default_value_t = telebridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Port on the node that receives the acknowledgment.
    #[arg(
        long,
        env = "TELEBRIDGE_ACK_PORT",
        default_value_t = telebridge_transport::DEFAULT_ACK_PORT
    )]
    pub ack_port: u16,
    /// Largest accepted datagram in bytes. Larger ones are rejected.
    #[arg(
        long,
        default_value_t = telebridge_transport::DEFAULT_MAX_DATAGRAM,
        value_parser = RangedU64ValueParser::<usize>::new().range(RECORD_SIZE as u64..)
    )]
    pub max_datagram: usize,
    /// Do not connect to the broker or publish records.
    #[arg(long, env = "TELEBRIDGE_NO_BUS")]
    pub no_bus: bool,
    /// Do not write the CSV log.
    #[arg(long, env = "TELEBRIDGE_NO_LOG")]
    pub no_log: bool,
    /// CSV log file, recreated at startup.
    #[arg(long, env = "TELEBRIDGE_LOG_FILE", default_value = telebridge_pipeline::DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
    /// MQTT broker host.
    #[arg(
        long,
        env = "TELEBRIDGE_BROKER_HOST",
        default_value = telebridge_pipeline::DEFAULT_BROKER_HOST
    )]
    pub broker_host: String,
    /// MQTT broker port.
    #[arg(
        long,
        env = "TELEBRIDGE_BROKER_PORT",
        default_value_t = telebridge_pipeline::DEFAULT_BROKER_PORT
    )]
    pub broker_port: u16,
    /// MQTT keep-alive in seconds.
    #[arg(long, env = "TELEBRIDGE_KEEP_ALIVE", default_value_t = 60)]
    pub keep_alive: u64,
    /// MQTT client id. Generated when omitted.
    #[arg(long)]
    pub client_id: Option<String>,
    /// Publish topic prefix; the node id is appended.
    #[arg(long, default_value = telebridge_pipeline::DEFAULT_TOPIC_PREFIX)]
    pub topic_prefix: String,
    /// Command topic suffix, appended to the prefix.
    #[arg(long, default_value = telebridge_pipeline::DEFAULT_COMMAND_SUFFIX)]
    pub command_suffix: String,
    /// MQTT QoS for published records (0, 1 or 2).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,
    /// Broker connect timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,
    /// Field names for the instrument slots (remote, z1).
    #[arg(long, default_value = "remote")]
    pub profile: FieldNameProfile,
    /// Log each rendered JSON document, pretty-printed.
    #[arg(long)]
    pub debug_json: bool,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Bridge address, e.g. 127.0.0.1:5678 or [fd00::1]:5678.
    pub addr: SocketAddr,
    /// Raw datagram as hex instead of a record built from flags.
    #[arg(long, conflicts_with_all = ["node_id", "node_subid", "sequence", "values", "battery"])]
    pub hex: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub node_id: u8,
    #[arg(long, default_value_t = 0)]
    pub node_subid: u8,
    #[arg(long, default_value_t = 0)]
    pub sequence: u16,
    /// The four instrument values, comma-separated.
    #[arg(long, value_delimiter = ',', default_values_t = [0u16, 0, 0, 0])]
    pub values: Vec<u16>,
    #[arg(long, default_value_t = 3300)]
    pub battery: u16,
    /// Wait for the acknowledgment and print it.
    #[arg(long)]
    pub wait: bool,
    /// Local port the acknowledgment arrives on.
    #[arg(long, default_value_t = telebridge_transport::DEFAULT_ACK_PORT)]
    pub ack_port: u16,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Datagram bytes as hex. Whitespace and a leading 0x are ignored.
    pub hex: String,
    /// Field names for the instrument slots (remote, z1).
    #[arg(long, default_value = "remote")]
    pub profile: FieldNameProfile,
    /// Sender address to show alongside the record.
    #[arg(long)]
    pub sender: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input must have an even number of digits"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| {
                    CliError::new(USAGE, format!("invalid hex byte at offset {}", i / 2))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_accepts_spacing_and_prefix() {
        assert_eq!(parse_hex("01 02 ff").unwrap(), vec![0x01, 0x02, 0xff]);
        assert_eq!(parse_hex("0x00aB").unwrap(), vec![0x00, 0xab]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("é1").unwrap_err().code, USAGE);
    }
}
