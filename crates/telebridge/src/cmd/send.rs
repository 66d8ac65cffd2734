use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use telebridge_record::{encode, TelemetryRecord};
use telebridge_transport::DatagramListener;
use tracing::info;

use crate::cmd::{parse_duration, parse_hex, SendArgs};
use crate::exit::{io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    // Bound before sending so a fast acknowledgment is not missed.
    let ack_listener = if args.wait {
        let local = SocketAddr::new(unspecified_like(args.addr.ip()), args.ack_port);
        let listener =
            DatagramListener::bind(local).map_err(|err| transport_error("ack bind failed", err))?;
        listener
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| transport_error("ack bind failed", err))?;
        Some(listener)
    } else {
        None
    };

    let socket = UdpSocket::bind((unspecified_like(args.addr.ip()), 0))
        .map_err(|err| io_error("socket setup failed", err))?;
    let sent = socket
        .send_to(&payload, args.addr)
        .map_err(|err| io_error(&format!("send to {} failed", args.addr), err))?;
    info!(addr = %args.addr, size = sent, "datagram sent");

    if let Some(mut listener) = ack_listener {
        let ack = listener
            .recv()
            .map_err(|err| transport_error("no acknowledgment", err))?;
        print_ack(&ack.payload, ack.sender, format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }

    let [field_1, field_2, field_3, field_4] = args.values[..] else {
        return Err(CliError::new(
            USAGE,
            format!("--values takes exactly 4 numbers, got {}", args.values.len()),
        ));
    };
    let record = TelemetryRecord {
        node_id: args.node_id,
        node_subid: args.node_subid,
        sequence: args.sequence,
        field_1,
        field_2,
        field_3,
        field_4,
        battery: args.battery,
    };
    Ok(encode(&record).to_vec())
}

fn unspecified_like(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
