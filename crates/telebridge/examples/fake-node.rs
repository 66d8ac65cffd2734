//! Simulated sensor node: sends one record per interval with an incrementing
//! sequence number and prints the bridge's greeting.
//!
//! Run the bridge without a broker:
//!   cargo run -- serve --no-bus --bind 127.0.0.1
//!
//! In another terminal:
//!   cargo run --example fake-node -- 127.0.0.1:5678 5

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use telebridge::record::{encode, TelemetryRecord};
use telebridge::transport::DEFAULT_ACK_PORT;

const INTERVAL: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let bridge: SocketAddr = argv
        .next()
        .unwrap_or_else(|| "127.0.0.1:5678".to_string())
        .parse()?;
    let rounds: u16 = argv.next().map(|n| n.parse()).transpose()?.unwrap_or(10);

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    let ack = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, DEFAULT_ACK_PORT))?;
    ack.set_read_timeout(Some(INTERVAL))?;

    let mut buf = [0u8; 64];
    for sequence in 0..rounds {
        let record = TelemetryRecord {
            node_id: 1,
            node_subid: 0,
            sequence,
            field_1: 2150 + sequence % 50,
            field_2: 1024,
            field_3: 2048,
            field_4: 4095,
            battery: 3300u16.saturating_sub(sequence),
        };
        socket.send_to(&encode(&record), bridge)?;
        eprintln!("Sent sequence {sequence} to {bridge}");

        match ack.recv_from(&mut buf) {
            Ok((n, from)) => eprintln!("Ack from {from}: {}", String::from_utf8_lossy(&buf[..n])),
            Err(e) => eprintln!("No ack: {e}"),
        }

        thread::sleep(INTERVAL);
    }

    Ok(())
}
