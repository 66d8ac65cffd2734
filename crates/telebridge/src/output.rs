use std::io::{IsTerminal, Write};
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use telebridge_record::{encode, header_row, to_json, to_row, FieldNameProfile, TelemetryRecord};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<&'a str>,
    profile: &'static str,
    node_id: u8,
    node_subid: u8,
    sequence: u16,
    battery: u16,
    values: Value,
}

#[derive(Serialize)]
struct AckOutput<'a> {
    from: String,
    size: usize,
    payload: &'a str,
}

/// Print one decoded record. `sender` is the node address when known.
pub fn print_record(
    record: &TelemetryRecord,
    sender: Option<&str>,
    profile: FieldNameProfile,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                sender,
                profile: profile.as_str(),
                node_id: record.node_id,
                node_subid: record.node_subid,
                sequence: record.sequence,
                battery: record.battery,
                values: value_list(record, profile),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let row: Vec<String> = to_row(sender.unwrap_or("-"), record)
                .iter()
                .map(ToString::to_string)
                .collect();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header_row(profile))
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let names = profile.field_names();
            let fields = record
                .fields()
                .iter()
                .zip(names)
                .map(|(value, name)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "node={}.{} seq={} {} battery={}{}",
                record.node_id,
                record.node_subid,
                record.sequence,
                fields,
                record.battery,
                sender.map(|s| format!(" from={s}")).unwrap_or_default()
            );
        }
        OutputFormat::Raw => print_raw(&encode(record)),
    }
}

/// Print an acknowledgment datagram received from the bridge.
pub fn print_ack(payload: &[u8], from: SocketAddr, format: OutputFormat) {
    let text = payload_preview(payload);
    match format {
        OutputFormat::Json => {
            let out = AckOutput {
                from: from.to_string(),
                size: payload.len(),
                payload: &text,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FROM", "SIZE", "PAYLOAD"])
                .add_row(vec![from.to_string(), payload.len().to_string(), text]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("ack from={from} size={} payload={text}", payload.len()),
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn value_list(record: &TelemetryRecord, profile: FieldNameProfile) -> Value {
    let mut doc = to_json(record, profile);
    doc["values"].take()
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
