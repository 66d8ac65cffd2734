use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use telebridge_pipeline::{BridgeConfig, CsvLog, Dispatcher, MqttBus, QosLevel, StartupError};
use telebridge_record::{header_row, RECORD_SIZE};
use telebridge_transport::{DatagramListener, ReplySender, TransportError};
use tracing::{info, warn};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{startup_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = bridge_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.inbound.socket_addr(),
        record_size = RECORD_SIZE,
        ack_port = config.ack.port,
        profile = %config.profile,
        storage = config.storage.enabled,
        bus = config.bus.enabled,
        "starting telebridge"
    );

    let addr = config.inbound.socket_addr();
    let mut listener = DatagramListener::bind_with_buffer(addr, config.inbound.max_datagram)
        .map_err(|err| startup_error(StartupError::BindFailed(err)))?;
    listener
        .set_read_timeout(Some(config.inbound.poll_interval))
        .map_err(|err| transport_error("socket setup failed", err))?;

    let storage = if config.storage.enabled {
        let log = CsvLog::create(&config.storage.path, &header_row(config.profile))
            .map_err(startup_error)?;
        Some(log)
    } else {
        None
    };

    let bus = if config.bus.enabled {
        Some(MqttBus::connect(&config.bus).map_err(startup_error)?)
    } else {
        None
    };

    let ack = ReplySender::new(config.ack.port);
    let mut dispatcher = Dispatcher::new(&config, storage, bus, ack);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(addr = %listener.local_addr(), "bridge ready");

    let mut handled = 0u64;
    while running.load(Ordering::SeqCst) {
        let datagram = match listener.recv() {
            Ok(datagram) => datagram,
            Err(TransportError::TimedOut) => continue,
            Err(TransportError::Truncated {
                sender,
                max_datagram,
            }) => {
                dispatcher.reject_truncated(sender, max_datagram);
                handled = handled.saturating_add(1);
                if args.count.is_some_and(|count| handled >= count) {
                    break;
                }
                continue;
            }
            Err(err) => {
                warn!(error = %err, "receive failed");
                continue;
            }
        };

        let report = dispatcher.handle(&datagram.payload, datagram.sender);
        if let Some(record) = report.record() {
            let sender = datagram.sender_ip().to_string();
            print_record(record, Some(&sender), config.profile, format);
        }

        handled = handled.saturating_add(1);
        if args.count.is_some_and(|count| handled >= count) {
            break;
        }
    }

    info!(stats = %dispatcher.stats(), "shutting down");
    if let Some(bus) = dispatcher.bus_mut() {
        bus.shutdown();
    }

    Ok(SUCCESS)
}

fn bridge_config(args: &ServeArgs) -> CliResult<BridgeConfig> {
    let mut config = BridgeConfig {
        profile: args.profile,
        debug_json: args.debug_json,
        ..BridgeConfig::default()
    };

    config.inbound.bind_addr = args.bind;
    config.inbound.port = args.port;
    config.inbound.max_datagram = args.max_datagram;
    config.ack.port = args.ack_port;

    config.storage.enabled = !args.no_log;
    config.storage.path = args.log_file.clone();

    config.bus.enabled = !args.no_bus;
    config.bus.host = args.broker_host.clone();
    config.bus.port = args.broker_port;
    config.bus.keep_alive = Duration::from_secs(args.keep_alive);
    config.bus.client_id = args.client_id.clone();
    config.bus.topic_prefix = args.topic_prefix.clone();
    config.bus.command_suffix = args.command_suffix.clone();
    config.bus.qos = QosLevel::from_level(args.qos)
        .ok_or_else(|| CliError::new(USAGE, format!("invalid QoS level: {}", args.qos)))?;
    config.bus.connect_timeout = parse_duration(&args.connect_timeout)?;

    Ok(config)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
