//! Live link-layer capture via `pnet` datalink channels.
//!
//! The datalink read blocks, so each `listen` spawns a dedicated capture thread that
//! forwards decoded events over a bounded channel. The thread exits when the receiver
//! is dropped or the interface read fails.

use crate::{EventSource, SourceItem};
use log::{info, warn};
use pnet::datalink::{self, Channel, Config};
use pnet::packet::arp::ArpPacket;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::Packet;
use std::io;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use wifitrack_core::{DeviceId, EventSourceError, MalformedEvent, NetworkEvent, Timestamp};

const CHANNEL_DEPTH: usize = 4096;

pub struct LinkCapture {
    read_timeout: Duration,
}

impl Default for LinkCapture {
    fn default() -> Self {
        LinkCapture { read_timeout: Duration::from_millis(250) }
    }
}

impl LinkCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long one blocking read may wait before the thread re-checks its receiver.
    pub fn with_read_timeout(mut self, t: Duration) -> Self {
        self.read_timeout = t;
        self
    }
}

impl EventSource for LinkCapture {
    fn listen(&mut self, interface: &str) -> Result<mpsc::Receiver<SourceItem>, EventSourceError> {
        let iface = datalink::interfaces()
            .into_iter()
            .find(|i| i.name == interface)
            .ok_or_else(|| EventSourceError::unavailable(interface, "no such interface"))?;
        let config = Config { read_timeout: Some(self.read_timeout), ..Default::default() };
        let mut link_rx = match datalink::channel(&iface, config) {
            Ok(Channel::Ethernet(_, rx)) => rx,
            Ok(_) => return Err(EventSourceError::unavailable(interface, "unsupported channel type")),
            Err(e) => return Err(EventSourceError::unavailable(interface, e.to_string())),
        };

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let name = interface.to_string();
        info!("capturing on {}", name);
        std::thread::Builder::new().name(format!("capture-{}", name)).spawn(move || {
            while !tx.is_closed() {
                match link_rx.next() {
                    Ok(frame) => {
                        if let Some(item) = decode_frame(frame, OffsetDateTime::now_utc()) {
                            if tx.blocking_send(item).is_err() { break; }
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        warn!("capture on {} stopped: {}", name, e);
                        break;
                    }
                }
            }
        })?;
        Ok(rx)
    }
}

/// Decode one Ethernet frame. Frames that are neither ARP nor IPv4/TCP yield `None`.
pub fn decode_frame(frame: &[u8], at: Timestamp) -> Option<SourceItem> {
    let eth = EthernetPacket::new(frame)?;
    match eth.get_ethertype() {
        EtherTypes::Arp => Some(match ArpPacket::new(eth.payload()) {
            Some(arp) => Ok(NetworkEvent::AddressAnnouncement {
                device: DeviceId::new(&arp.get_sender_hw_addr().to_string()),
                at,
            }),
            None => Err(MalformedEvent::new("truncated ARP payload")),
        }),
        EtherTypes::Ipv4 => {
            let ip = Ipv4Packet::new(eth.payload())?;
            if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
                return None;
            }
            Some(match TcpPacket::new(ip.payload()) {
                Some(tcp) => Ok(NetworkEvent::ConnectionAttempt {
                    source: DeviceId::new(&eth.get_source().to_string()),
                    destination_port: tcp.get_destination(),
                    at,
                }),
                None => Err(MalformedEvent::new("truncated TCP segment")),
            })
        }
        _ => None,
    }
}
