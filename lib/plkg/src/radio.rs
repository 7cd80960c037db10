//! Serial link to one radio device. A listener thread splits the byte
//! stream into lines and routes them (CSI records into the aggregator, chat
//! payloads into the inbox); outbound commands share one mutex-guarded
//! writer so their bytes never interleave.

use crate::csi::{self, Aggregator};
use crate::medium::PublicChannel;
use crate::message::PublicMessage;
use crate::queue::Inbox;
use crate::support::{ErrorKind, PlkgError, PlkgResult, Role};
use aether::logging;
use serde_derive::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const RESTART_SETTLE: Duration = Duration::from_millis(1500);
const INIT_SETTLE: Duration = Duration::from_millis(500);

/// Markers identifying a chat record among the radio's console output.
const CHAT_MARKERS: [&str; 3] = ["MSG_RECV", "Chat", "MSG from"];

/// Persisted-traffic sink. The rig writes one CSV per endpoint.
pub trait TrafficLog: Send + Sync {
    fn record(&self, kind: RecordKind, line: &str);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordKind {
    Csi,
    Msg,
}

/// Whose transmissions a capture should be filtered to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CaptureSource {
    Initiator,
    Responder,
}

/// The narrow control surface the orchestrator drives. Kept separate from
/// the link so the pipeline can run over an in-process fake.
pub trait RadioControl: Send + Sync {
    /// Soft-reset and configure the radio; enable chat reception.
    fn setup(&self) -> PlkgResult<()>;
    /// Start broadcasting pings for the given duration.
    fn start_ping(&self, duration: Duration) -> PlkgResult<()>;
    /// Start capturing CSI filtered by the given transmitter.
    fn start_capture(&self, duration: Duration, source: CaptureSource) -> PlkgResult<()>;
}

/// Air-side parameters shared by the whole rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    pub channel: u8,
    pub bandwidth: u8,
    pub ping_rate: u32,
    pub initiator_mac: String,
    pub responder_mac: String,
    pub eavesdropper_mac: String,
    pub broadcast_mac: String,
}

impl Default for WifiConfig {
    fn default() -> WifiConfig {
        WifiConfig {
            channel: 6,
            bandwidth: 40,
            ping_rate: 100,
            initiator_mac: "aa:bb:cc:dd:ee:01".to_string(),
            responder_mac: "aa:bb:cc:dd:ee:02".to_string(),
            eavesdropper_mac: "aa:bb:cc:dd:ee:03".to_string(),
            broadcast_mac: "ff:ff:ff:ff:ff:ff".to_string(),
        }
    }
}

impl WifiConfig {
    fn mac_of(&self, role: Role) -> &str {
        match role {
            Role::Initiator => &self.initiator_mac,
            Role::Responder => &self.responder_mac,
            Role::Eavesdropper => &self.eavesdropper_mac,
        }
    }
}

pub struct RadioLink {
    role: Role,
    wifi: WifiConfig,
    writer: Mutex<Box<dyn SerialPort>>,
    shutdown: Arc<AtomicBool>,
    listener: Option<thread::JoinHandle<()>>,
    log: logging::Logger,
}

impl RadioLink {
    /// Opens the serial port and spawns the listener. The aggregator is
    /// written only by the listener thread; the orchestrator reads it
    /// between stages.
    pub fn open<'a, L: Into<Option<&'a logging::Logger>>>(
        port: &str,
        baud: u32,
        role: Role,
        wifi: WifiConfig,
        aggregator: Arc<Mutex<Aggregator>>,
        inbox: Arc<Inbox>,
        traffic: Option<Arc<dyn TrafficLog>>,
        log: L,
    ) -> PlkgResult<RadioLink> {
        let link_log = match log.into() {
            Some(log) => log.new(logging::o!("role" => role.name(), "port" => port.to_string())),
            _ => logging::null(),
        };

        let writer = serialport::new(port, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(serial_error)?;
        let reader = writer.try_clone().map_err(serial_error)?;

        logging::info!(link_log, "serial link opened"; "baud" => baud);

        let shutdown = Arc::new(AtomicBool::new(false));
        let listener = {
            let shutdown = shutdown.clone();
            let log = link_log.new(logging::o!());

            thread::Builder::new()
                .name(format!("{}-listen", role.name()))
                .spawn(move || listen(reader, aggregator, inbox, traffic, shutdown, log))
                .map_err(PlkgError::from)?
        };

        Ok(RadioLink {
            role,
            wifi,
            writer: Mutex::new(writer),
            shutdown,
            listener: Some(listener),
            log: link_log,
        })
    }

    /// Writes one newline-terminated command, holding the port lock for the
    /// whole line.
    fn command(&self, line: &str) -> PlkgResult<()> {
        logging::debug!(self.log, "command"; "line" => line);

        let mut port = self.writer.lock().expect("Serial writer lock poisoned");
        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;

        Ok(())
    }

    pub fn restart(&self) -> PlkgResult<()> {
        self.command("restart")
    }

    pub fn radio_init(&self) -> PlkgResult<()> {
        let own_mac = self.wifi.mac_of(self.role);
        self.command(&format_radio_init(&self.wifi, own_mac))
    }

    pub fn ping(&self, seconds: u64) -> PlkgResult<()> {
        self.command(&format_ping(seconds, self.wifi.ping_rate, &self.wifi.broadcast_mac))
    }

    pub fn recv(&self, seconds: u64, source_mac: &str) -> PlkgResult<()> {
        self.command(&format_recv(seconds, source_mac))
    }

    pub fn msg_listen(&self) -> PlkgResult<()> {
        self.command("msg_listen")
    }

    pub fn msg_send(&self, dst_mac: &str, text: &str) -> PlkgResult<()> {
        self.command(&format_msg_send(dst_mac, text))
    }
}

impl RadioControl for RadioLink {
    fn setup(&self) -> PlkgResult<()> {
        self.restart()?;
        thread::sleep(RESTART_SETTLE);

        self.radio_init()?;
        thread::sleep(INIT_SETTLE);

        self.msg_listen()
    }

    fn start_ping(&self, duration: Duration) -> PlkgResult<()> {
        self.ping(duration.as_secs().max(1))
    }

    fn start_capture(&self, duration: Duration, source: CaptureSource) -> PlkgResult<()> {
        let mac = match source {
            CaptureSource::Initiator => self.wifi.initiator_mac.clone(),
            CaptureSource::Responder => self.wifi.responder_mac.clone(),
        };

        self.recv(duration.as_secs().max(1), &mac)
    }
}

impl PublicChannel for RadioLink {
    fn publish(&self, message: &PublicMessage) -> PlkgResult<()> {
        self.msg_send(&self.wifi.broadcast_mac, &message.encode())
    }
}

impl Drop for RadioLink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(listener) = self.listener.take() {
            drop(listener.join());
        }
    }
}

fn listen(
    mut reader: Box<dyn SerialPort>,
    aggregator: Arc<Mutex<Aggregator>>,
    inbox: Arc<Inbox>,
    traffic: Option<Arc<dyn TrafficLog>>,
    shutdown: Arc<AtomicBool>,
    log: logging::Logger,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 1024];

    while !shutdown.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => (),
            Ok(count) => {
                for line in assembler.feed(&buf[..count]) {
                    route_line(&line, &aggregator, &inbox, traffic.as_deref(), &log);
                }
            }
            Err(err)
                if err.kind() == io::ErrorKind::TimedOut
                    || err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => {
                // The device is gone; the session will notice via timeouts.
                logging::error!(log, "serial link lost"; "error" => ?err);
                break;
            }
        }
    }
}

/// Classifies one line and routes it to its consumer.
fn route_line(
    line: &str,
    aggregator: &Mutex<Aggregator>,
    inbox: &Inbox,
    traffic: Option<&dyn TrafficLog>,
    log: &logging::Logger,
) {
    if line.contains(csi::CSI_MARKER) {
        if let Some(traffic) = traffic {
            traffic.record(RecordKind::Csi, line);
        }

        match csi::parse_line(line) {
            Ok(frame) => aggregator.lock().expect("Aggregator lock poisoned").push(frame),
            Err(_) => {
                logging::debug!(log, "dropping malformed frame"; "line" => line);
            }
        }

        return;
    }

    if CHAT_MARKERS.iter().any(|marker| line.contains(marker)) {
        if let Some(traffic) = traffic {
            traffic.record(RecordKind::Msg, line);
        }

        if let Some(message) = PublicMessage::decode(line) {
            logging::trace!(log, "public message"; "tag" => message.tag_name());
            inbox.push(message);
        }
    }
}

/// Reassembles complete lines out of arbitrarily chunked serial reads.
struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    fn new() -> LineAssembler {
        LineAssembler { pending: String::new() }
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line = self.pending[..pos].trim_end_matches('\r').to_string();
            self.pending.drain(..=pos);

            if !line.is_empty() {
                lines.push(line);
            }
        }

        lines
    }
}

fn format_radio_init(wifi: &WifiConfig, own_mac: &str) -> String {
    format!(
        "radio_init -c {} -b {} -m {} -s below --restart",
        wifi.channel, wifi.bandwidth, own_mac
    )
}

fn format_ping(seconds: u64, rate: u32, dst_mac: &str) -> String {
    format!("ping -t {} -r {} -m {}", seconds, rate, dst_mac)
}

fn format_recv(seconds: u64, src_mac: &str) -> String {
    format!("recv -t {} -m {}", seconds, src_mac)
}

fn format_msg_send(dst_mac: &str, text: &str) -> String {
    format!("msg_send -m {} \"{}\"", dst_mac, text)
}

fn serial_error(err: serialport::Error) -> PlkgError {
    let kind = match err.kind {
        serialport::ErrorKind::Io(kind) => kind,
        serialport::ErrorKind::NoDevice => io::ErrorKind::NotFound,
        _ => io::ErrorKind::Other,
    };

    PlkgError::Fatal(ErrorKind::SerialUnavailable(kind))
}
