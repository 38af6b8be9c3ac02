//! # TCP Transport
//!
//! Non-blocking `std::net` transport. Each packet travels in a frame made of a big-endian
//! `u32` length followed by the packet bytes. TCP already provides reliable, ordered
//! delivery, so `send_reliable` only has to frame and buffer.
//!
//! The listener and every stream are non-blocking; `poll` and `flush` never wait.

use std::{
    collections::HashMap,
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
};

use log::{debug, info, warn};

use crate::error::{StreamError, StreamResult};

use super::{NetEvent, PeerId, Transport};

/// Largest inbound frame accepted. Clients only send small control packets.
pub const MAX_INBOUND_FRAME: usize = 64 * 1024;

const FRAME_HEADER: usize = 4;
const READ_CHUNK: usize = 4096;

struct Connection {
    stream: TcpStream,
    address: SocketAddr,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

impl Connection {
    /// Reads everything currently available. Returns `false` once the peer is gone.
    fn fill(&mut self) -> bool {
        let mut scratch = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => return false,
                Ok(n) => self.inbound.extend_from_slice(&scratch[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!("Read from {} failed: {}", self.address, err);
                    return false;
                }
            }
        }
    }

    /// Splits complete frames off the inbound buffer.
    fn frames(&mut self) -> Result<Vec<Vec<u8>>, usize> {
        let mut frames = Vec::new();
        let mut consumed = 0;
        while self.inbound.len() - consumed >= FRAME_HEADER {
            let header = &self.inbound[consumed..consumed + FRAME_HEADER];
            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            if length > MAX_INBOUND_FRAME {
                return Err(length);
            }
            let start = consumed + FRAME_HEADER;
            if self.inbound.len() < start + length {
                break;
            }
            frames.push(self.inbound[start..start + length].to_vec());
            consumed = start + length;
        }
        self.inbound.drain(..consumed);
        Ok(frames)
    }

    /// Writes as much of the outbound buffer as the socket takes.
    fn drain_outbound(&mut self) -> io::Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

/// Length-prefixed TCP transport.
pub struct TcpTransport {
    listener: TcpListener,
    connections: HashMap<PeerId, Connection>,
    next_peer: u64,
}

impl TcpTransport {
    /// Binds a non-blocking listener.
    ///
    /// # Arguments
    /// * `address` - Socket address to listen on, e.g. `"0.0.0.0:7777"`
    ///
    /// # Returns
    /// The transport, or `StreamError::NetworkBind` if the address cannot be used
    pub fn bind(address: &str) -> StreamResult<Self> {
        let bind_error = |source| StreamError::NetworkBind {
            addr: address.to_string(),
            source,
        };
        let listener = TcpListener::bind(address).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        info!("Listening on {}", listener.local_addr().map_err(bind_error)?);

        Ok(TcpTransport {
            listener,
            connections: HashMap::new(),
            next_peer: 1,
        })
    }

    /// The address the listener actually bound, useful with port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn accept_pending(&mut self, events: &mut Vec<NetEvent>) {
        loop {
            match self.listener.accept() {
                Ok((stream, address)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!("Rejecting {}: {}", address, err);
                        continue;
                    }
                    // Chunk packets are latency sensitive; losing Nagle is not fatal.
                    let _ = stream.set_nodelay(true);

                    let peer = PeerId(self.next_peer);
                    self.next_peer += 1;
                    info!("{} connected from {}", peer, address);
                    self.connections.insert(
                        peer,
                        Connection {
                            stream,
                            address,
                            inbound: Vec::new(),
                            outbound: Vec::new(),
                            closed: false,
                        },
                    );
                    events.push(NetEvent::Connected(peer));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("Accept failed: {}", err);
                    break;
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn poll(&mut self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        self.accept_pending(&mut events);

        let mut peers: Vec<PeerId> = self.connections.keys().copied().collect();
        peers.sort();
        for peer in peers {
            let Some(connection) = self.connections.get_mut(&peer) else {
                continue;
            };
            let open = !connection.closed && connection.fill();
            match connection.frames() {
                Ok(frames) => {
                    events.extend(frames.into_iter().map(|frame| NetEvent::Received(peer, frame)))
                }
                Err(length) => {
                    warn!("{} sent an oversized frame ({} bytes); closing", peer, length);
                    connection.closed = true;
                }
            }
            if !open || connection.closed {
                info!("{} disconnected", peer);
                self.connections.remove(&peer);
                events.push(NetEvent::Disconnected(peer));
            }
        }
        events
    }

    fn send_reliable(&mut self, peer: PeerId, bytes: &[u8]) -> io::Result<()> {
        let connection = self
            .connections
            .get_mut(&peer)
            .filter(|connection| !connection.closed)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, format!("{} is not connected", peer)))?;
        let length = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "packet too large to frame"))?;
        connection.outbound.extend_from_slice(&length.to_be_bytes());
        connection.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        for (peer, connection) in self.connections.iter_mut() {
            if connection.closed {
                continue;
            }
            if let Err(err) = connection.drain_outbound() {
                // Reported as a disconnect on the next poll.
                warn!("Write to {} failed: {}", peer, err);
                connection.closed = true;
            }
        }
        Ok(())
    }
}
