use std::fs;
use std::io;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use p2p_config::{CONTROL_MESSAGE_MAX_SIZE, RATE_PACING_INTERVAL, TCP_MAX_PENDING_CONNECTIONS};
use p2p_core::entities::{ChunkHeader, PeerEndpoint, PeerIdentity};
use p2p_core::utils::create_buffer;
use socket2::{Domain, Protocol, Socket, Type};

use crate::store::ChunkStore;
use crate::LOGGER;

/// The stream plane: accepts inbound connections carrying framed chunk
/// transfers, and pushes requested chunks out with rate pacing. Transfers
/// are fire-and-forget; a chunk lost to truncation simply never arrives.
pub struct StreamTransport {
    listener: TcpListener,
    store: Arc<ChunkStore>,
    /// Own advertised rate, capping outbound throughput per connection.
    rate: u32,
}

impl StreamTransport {
    pub fn bind(identity: &PeerIdentity, store: Arc<ChunkStore>) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, identity.stream_port));
        socket.bind(&addr.into())?;
        socket.listen(TCP_MAX_PENDING_CONNECTIONS)?;

        LOGGER.info(format!(
            "stream transport listening on {}:{}",
            identity.ip, identity.stream_port
        ));
        Ok(Self {
            listener: socket.into(),
            store,
            rate: identity.rate,
        })
    }

    /// Accept loop; one receiver thread per connection. Runs until process
    /// exit.
    pub fn run(&self) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let store = Arc::clone(&self.store);
                    thread::spawn(move || receive_chunks(stream, store));
                }
                Err(e) => LOGGER.error(format!("stream accept failed: {e}")),
            }
        }
    }

    /// Connects to the requester's stream endpoint and pushes every listed
    /// chunk over the single connection. A missing artifact is logged and
    /// skipped; the connection closes when the list is done.
    pub fn push_chunks(
        &self,
        file: &str,
        chunks: &[u32],
        destination: &PeerEndpoint,
    ) -> io::Result<()> {
        let mut stream = TcpStream::connect((destination.ip.as_str(), destination.port))?;
        LOGGER.debug(format!(
            "chunk: pushing {} chunks of '{file}' to {destination}",
            chunks.len()
        ));

        for &chunk_id in chunks {
            let path = self.store.chunk_path(file, chunk_id);
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    LOGGER.error(format!("chunk: {} unreadable, skipping: {e}", path.display()));
                    continue;
                }
            };

            let header = ChunkHeader {
                file_name: file.to_string(),
                chunk_id,
                sender_rate: self.rate,
                chunk_size: data.len(),
            };
            let mut frame = [0u8; CONTROL_MESSAGE_MAX_SIZE];
            if let Err(e) = header.encode_into(&mut frame) {
                LOGGER.error(format!("chunk: cannot frame chunk {chunk_id} of '{file}': {e}"));
                continue;
            }

            self.send_paced(&mut stream, &frame)?;
            self.send_paced(&mut stream, &data)?;
            LOGGER.success(format!(
                "chunk: sent chunk {chunk_id} of '{file}' to {destination} ({} bytes)",
                data.len()
            ));
        }
        Ok(())
    }

    /// Writes `bytes` in blocks of at most the advertised rate, sleeping the
    /// pacing interval after each block. Coarse, but caps throughput at
    /// roughly `rate` bytes per second.
    fn send_paced(&self, stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
        let block = self.rate.max(1) as usize;
        for part in bytes.chunks(block) {
            stream.write_all(part)?;
            thread::sleep(RATE_PACING_INTERVAL);
        }
        Ok(())
    }
}

/// Drains one inbound connection: header frames assembled across partial
/// reads, then exactly `chunk_size` payload bytes read in slices of at most
/// the sender's advertised rate. A clean close between frames ends the
/// connection; a close mid-frame is logged and drops it.
fn receive_chunks(mut stream: TcpStream, store: Arc<ChunkStore>) {
    let sender = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| String::from("unknown"));

    loop {
        let mut frame = [0u8; CONTROL_MESSAGE_MAX_SIZE];
        let mut filled = 0;
        while filled < frame.len() {
            match stream.read(&mut frame[filled..]) {
                Ok(0) if filled == 0 => {
                    LOGGER.debug(format!("chunk: {sender} closed the connection"));
                    return;
                }
                Ok(0) => {
                    LOGGER.error(format!(
                        "chunk: {sender} closed mid-header ({filled}/{} bytes)",
                        frame.len()
                    ));
                    return;
                }
                Ok(n) => filled += n,
                Err(e) => {
                    LOGGER.error(format!("chunk: header read from {sender} failed: {e}"));
                    return;
                }
            }
        }

        let header = match ChunkHeader::parse(&frame) {
            Ok(header) => header,
            Err(e) => {
                LOGGER.error(format!("chunk: bad control header from {sender}: {e}"));
                return;
            }
        };

        let mut payload = create_buffer(header.chunk_size);
        let step = header.sender_rate.max(1) as usize;
        let mut received = 0;
        while received < payload.len() {
            let end = (received + step).min(payload.len());
            match stream.read(&mut payload[received..end]) {
                Ok(0) => {
                    LOGGER.error(format!(
                        "chunk: {sender} closed mid-chunk {} ({received}/{} bytes)",
                        header.chunk_id,
                        payload.len()
                    ));
                    return;
                }
                Ok(n) => received += n,
                Err(e) => {
                    LOGGER.error(format!(
                        "chunk: payload read from {sender} failed: {e}"
                    ));
                    return;
                }
            }
        }

        LOGGER.info(format!(
            "chunk: received chunk {} of '{}' from {sender} ({} bytes)",
            header.chunk_id,
            header.file_name,
            payload.len()
        ));
        if let Err(e) = store.save_chunk(&header.file_name, header.chunk_id, &payload) {
            LOGGER.error(format!(
                "chunk: saving chunk {} of '{}' failed: {e}",
                header.chunk_id, header.file_name
            ));
        }
    }
}
