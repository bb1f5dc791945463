use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::str;
use std::sync::Arc;
use std::thread;

use p2p_config::{CONTROL_MESSAGE_MAX_SIZE, CONTROL_WORKERS, DISCOVERY_MESSAGE_INTERVAL};
use p2p_core::entities::{Message, PeerEndpoint, PeerIdentity, ProviderRecord};
use threadpool::ThreadPool;

use crate::discovery::DiscoveryTable;
use crate::planner::assign_chunks;
use crate::store::ChunkStore;
use crate::transfer::StreamTransport;
use crate::LOGGER;

/// The UDP control plane: one bound socket carrying the DISCOVERY flood,
/// RESPONSE collection and REQUEST dispatch for a peer.
pub struct ControlPlane {
    socket: UdpSocket,
    identity: Arc<PeerIdentity>,
    store: Arc<ChunkStore>,
    discovery: Arc<DiscoveryTable>,
    transfer: Arc<StreamTransport>,
}

impl ControlPlane {
    pub fn bind(
        identity: Arc<PeerIdentity>,
        store: Arc<ChunkStore>,
        discovery: Arc<DiscoveryTable>,
        transfer: Arc<StreamTransport>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, identity.control_port))?;
        LOGGER.info(format!(
            "control plane listening on {}:{}",
            identity.ip, identity.control_port
        ));
        Ok(Self {
            socket,
            identity,
            store,
            discovery,
            transfer,
        })
    }

    /// Receive loop: each datagram is parsed and handled on a bounded worker
    /// pool. Runs until process exit; transient socket errors are logged.
    pub fn run(self: &Arc<Self>) {
        let pool = ThreadPool::new(CONTROL_WORKERS);
        let mut buf = [0u8; CONTROL_MESSAGE_MAX_SIZE];
        loop {
            let (len, sender) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    LOGGER.error(format!("control recv failed: {e}"));
                    continue;
                }
            };
            let raw = match str::from_utf8(&buf[..len]) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    LOGGER.error(format!("non-text datagram from {sender}, dropping"));
                    continue;
                }
            };
            let plane = Arc::clone(self);
            pool.execute(move || plane.process(&raw, sender));
        }
    }

    fn process(&self, raw: &str, sender: SocketAddr) {
        match raw.parse::<Message>() {
            Ok(Message::Discovery {
                file,
                total_chunks,
                ttl,
                origin,
            }) => self.handle_discovery(&file, total_chunks, ttl, &origin, sender),
            Ok(Message::Response { file, rate, chunks }) => {
                self.handle_response(&file, rate, &chunks, sender)
            }
            Ok(Message::Request {
                file,
                stream_port,
                chunks,
            }) => self.handle_request(file, stream_port, chunks, sender),
            Err(e) => LOGGER.error(format!("dropping datagram from {sender}: {e}")),
        }
    }

    /// A flooded query. Our own flood coming back (origin == self) is
    /// dropped outright. Otherwise: answer with whatever we hold, then
    /// forward with a decremented TTL. A TTL of zero is still answered,
    /// just not forwarded.
    fn handle_discovery(
        &self,
        file: &str,
        total_chunks: u32,
        ttl: u32,
        origin: &PeerEndpoint,
        sender: SocketAddr,
    ) {
        if origin.ip == self.identity.ip && origin.port == self.identity.control_port {
            LOGGER.debug(format!("discovery: own flood for '{file}' returned, dropping"));
            return;
        }

        LOGGER.info(format!(
            "discovery: '{file}' ttl={ttl} via {sender}, reply goes to {origin}"
        ));
        self.send_response(file, origin);

        if ttl > 0 {
            self.send_discovery(file, total_chunks, ttl - 1, origin);
        }
    }

    /// Tells `origin` which chunks of `file` this peer can serve. Nothing is
    /// sent when the store holds no chunk of the file.
    fn send_response(&self, file: &str, origin: &PeerEndpoint) {
        let chunks = self.store.available(file);
        if chunks.is_empty() {
            LOGGER.debug(format!("response: no local chunks of '{file}'"));
            return;
        }
        let message = Message::Response {
            file: file.to_string(),
            rate: self.identity.rate,
            chunks,
        };
        self.send(origin, &message, "response");
    }

    /// Floods a DISCOVERY to every neighbor, pausing between sends to space
    /// out the amplification. Used both at search start (full TTL, origin =
    /// self) and when forwarding someone else's query (origin preserved).
    pub fn send_discovery(&self, file: &str, total_chunks: u32, ttl: u32, origin: &PeerEndpoint) {
        let message = Message::Discovery {
            file: file.to_string(),
            total_chunks,
            ttl,
            origin: origin.clone(),
        };
        for neighbor in &self.identity.neighbors {
            self.send(neighbor, &message, "discovery");
            thread::sleep(DISCOVERY_MESSAGE_INTERVAL);
        }
    }

    /// An offer of chunks. Dropped when the file's response window is
    /// closed; otherwise chunks we already hold are filtered out and the
    /// rest recorded against the sender's control endpoint.
    fn handle_response(&self, file: &str, rate: u32, chunks: &[u32], sender: SocketAddr) {
        if !self.discovery.window_open(file) {
            LOGGER.info(format!(
                "response: window closed for '{file}', dropping offer from {sender}"
            ));
            return;
        }

        let missing: Vec<u32> = chunks
            .iter()
            .copied()
            .filter(|&chunk_id| !self.store.has_chunk(file, chunk_id))
            .collect();
        if missing.is_empty() {
            LOGGER.debug(format!(
                "response: {sender} offers nothing we miss of '{file}'"
            ));
            return;
        }

        let provider = ProviderRecord::new(sender.ip().to_string(), sender.port(), rate);
        if self.discovery.record_if_open(file, &missing, &provider) {
            LOGGER.info(format!(
                "response: {sender} offers chunks {missing:?} of '{file}' at {rate} B/s"
            ));
        } else {
            LOGGER.info(format!(
                "response: window closed for '{file}', dropping offer from {sender}"
            ));
        }
    }

    /// Another peer wants chunks pushed to its stream port. The push paces
    /// itself with second-long sleeps, so it gets a dedicated thread instead
    /// of a pool worker.
    fn handle_request(&self, file: String, stream_port: u16, chunks: Vec<u32>, sender: SocketAddr) {
        LOGGER.info(format!(
            "request: {sender} wants chunks {chunks:?} of '{file}' on stream port {stream_port}"
        ));
        let destination = PeerEndpoint::new(sender.ip().to_string(), stream_port);
        let transfer = Arc::clone(&self.transfer);
        thread::spawn(move || {
            if let Err(e) = transfer.push_chunks(&file, &chunks, &destination) {
                LOGGER.error(format!("chunk push to {destination} failed: {e}"));
            }
        });
    }

    /// Snapshots the discovery table, runs the planner, and sends one
    /// REQUEST per selected provider. Called once the response window has
    /// closed.
    pub fn send_requests(&self, file: &str) {
        let plan = assign_chunks(&self.discovery.snapshot(file));
        if plan.is_empty() {
            LOGGER.info(format!("request: no providers found for '{file}'"));
            return;
        }
        for (provider_key, chunks) in plan {
            let endpoint: PeerEndpoint = match provider_key.parse() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    LOGGER.error(format!("request: bad provider key: {e}"));
                    continue;
                }
            };
            let message = Message::Request {
                file: file.to_string(),
                stream_port: self.identity.stream_port,
                chunks,
            };
            self.send(&endpoint, &message, "request");
        }
    }

    fn send(&self, to: &PeerEndpoint, message: &Message, what: &str) {
        let encoded = message.to_string();
        if encoded.len() > CONTROL_MESSAGE_MAX_SIZE {
            LOGGER.error(format!(
                "{what}: message for {to} exceeds the {CONTROL_MESSAGE_MAX_SIZE}-byte datagram cap, not sent"
            ));
            return;
        }
        match self.socket.send_to(encoded.as_bytes(), (to.ip.as_str(), to.port)) {
            Ok(_) => LOGGER.debug(format!("{what}: sent to {to} -> {encoded}")),
            Err(e) => LOGGER.error(format!("{what}: send to {to} failed: {e}")),
        }
    }
}
