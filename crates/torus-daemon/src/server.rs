//! The event loop: one task multiplexing the TCP listener, the UDP socket
//! and the periodic timer.
//!
//! Everything the server holds (node state, lookup cache, object store,
//! sockets) is owned by this loop and touched from nowhere else, so no
//! locking is involved anywhere. Each TCP client is handled to completion
//! within its loop iteration, bounding in-flight requests at one.
//!
//! A loop iteration:
//! 1. If the node owes a control packet (`Joining`/`Stabilizing`), emit it
//!    and return the status to `Ok`. TCP accepts stay disabled until then.
//! 2. Wait for the timer (the poll period), an inbound TCP connection, or
//!    an inbound UDP datagram.
//! 3. Handle the one event: count the tick and maybe schedule a stabilize;
//!    or serve the HTTP exchange; or run the control protocol handler and
//!    send its answer.

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use torus_dht::{protocol, MembershipStatus, Node};
use torus_http::codec::{self, Response};
use torus_http::routing::{self, Routed};
use torus_store::MemoryStore;
use torus_wire::{Packet, PACKET_LEN};

use crate::config::ServerConfig;

/// Upper bound on one buffered HTTP request.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// The server: sockets plus all the state the event loop owns.
pub struct Server {
    config: ServerConfig,
    tcp: TcpListener,
    udp: UdpSocket,
    node: Option<Node>,
    store: MemoryStore,
    ticks: u64,
}

impl Server {
    /// Bind the TCP listener and the UDP socket on the configured address
    /// and assemble the node state.
    ///
    /// Both sockets share one port; with port 0 the kernel-assigned TCP
    /// port is reused for UDP so the invariant holds.
    pub async fn bind(mut config: ServerConfig, store: MemoryStore) -> anyhow::Result<Self> {
        let requested = SocketAddrV4::new(config.host, config.port);
        let tcp = TcpListener::bind(requested)
            .await
            .with_context(|| format!("binding TCP listener on {requested}"))?;

        let port = tcp.local_addr().context("TCP local address")?.port();
        config.port = port;

        let udp = UdpSocket::bind(SocketAddrV4::new(config.host, port))
            .await
            .with_context(|| format!("binding UDP socket on {}:{port}", config.host))?;

        let node = config.build_node();
        match &node {
            Some(node) => info!(
                addr = %SocketAddrV4::new(config.host, port),
                node_id = node.id,
                status = ?node.status,
                "Ring node listening"
            ),
            None => info!(
                addr = %SocketAddrV4::new(config.host, port),
                "Plain web server listening"
            ),
        }

        Ok(Self {
            config,
            tcp,
            udp,
            node,
            store,
            ticks: 0,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.config.host, self.config.port)
    }

    /// Run the loop until the process is terminated.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut timer =
            tokio::time::interval(Duration::from_millis(self.config.tunables.poll_interval_ms));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut udp_buf = [0u8; 4 * PACKET_LEN];

        loop {
            self.emit_control().await;

            enum Event {
                Timer,
                Client(TcpStream, SocketAddr),
                Datagram(usize, SocketAddr),
            }

            let event = tokio::select! {
                _ = timer.tick() => Event::Timer,
                accepted = self.tcp.accept(), if self.tcp_enabled() => match accepted {
                    Ok((stream, peer)) => Event::Client(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
                received = self.udp.recv_from(&mut udp_buf) => match received {
                    Ok((len, src)) => Event::Datagram(len, src),
                    Err(e) => {
                        warn!(error = %e, "UDP receive failed");
                        continue;
                    }
                },
            };

            match event {
                Event::Timer => self.on_timer(),
                Event::Client(stream, peer) => self.handle_client(stream, peer).await,
                Event::Datagram(len, src) => self.handle_datagram(&udp_buf[..len], src).await,
            }
        }
    }

    /// TCP accepts run only while the membership status is settled.
    fn tcp_enabled(&self) -> bool {
        self.node
            .as_ref()
            .map_or(true, |n| n.status == MembershipStatus::Ok)
    }

    /// Emit the control packet the current status owes, if any, and settle
    /// back to `Ok`. Send failures are logged and not retried; the next
    /// stabilize round repairs the ring.
    async fn emit_control(&mut self) {
        let Some(node) = &mut self.node else {
            return;
        };
        match node.status {
            MembershipStatus::Ok => {}
            MembershipStatus::Joining => {
                let me = node.self_neighbor();
                match self.config.dht.as_ref().and_then(|d| d.anchor) {
                    Some(anchor) => {
                        let pkt = Packet::join(&me);
                        match self.udp.send_to(&pkt.encode(), anchor).await {
                            Ok(_) => info!(to = %anchor, "Join emitted"),
                            Err(e) => warn!(to = %anchor, error = %e, "Join send failed"),
                        }
                    }
                    None => warn!("Joining without an anchor, nothing to emit"),
                }
                node.status = MembershipStatus::Ok;
            }
            MembershipStatus::Stabilizing => {
                let me = node.self_neighbor();
                if let Some(succ) = node.succ.clone() {
                    let pkt = Packet::stabilize(&me);
                    match self.udp.send_to(&pkt.encode(), succ.endpoint()).await {
                        Ok(_) => debug!(to = %succ, "Stabilize emitted"),
                        Err(e) => warn!(to = %succ, error = %e, "Stabilize send failed"),
                    }
                }
                node.status = MembershipStatus::Ok;
            }
        }
    }

    /// Count a timer tick and schedule the periodic stabilize.
    fn on_timer(&mut self) {
        self.ticks += 1;
        if self.config.no_stabilize {
            return;
        }
        let interval = self.config.tunables.stabilize_interval_ticks;
        if interval == 0 {
            return;
        }
        let Some(node) = &mut self.node else {
            return;
        };
        if node.status == MembershipStatus::Ok
            && node.succ.is_some()
            && self.ticks % interval == 0
        {
            debug!(tick = self.ticks, "Scheduling stabilize");
            node.status = MembershipStatus::Stabilizing;
        }
    }

    /// Serve one TCP client to completion and close it.
    async fn handle_client(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "Client accepted");

        let routed = match self.read_request(&mut stream).await {
            Some(raw) => match codec::parse_request(&raw) {
                Ok(req) => routing::route(&req, self.node.as_mut(), &mut self.store),
                Err(e) => {
                    debug!(%peer, error = %e, "Request parse failed");
                    Routed {
                        response: Response::new(400),
                        lookup: None,
                    }
                }
            },
            None => {
                debug!(%peer, "No usable request, closing client");
                return;
            }
        };

        if let Err(e) = stream.write_all(&routed.response.to_bytes()).await {
            warn!(%peer, error = %e, "Response write failed");
        }
        let _ = stream.shutdown().await;

        if let Some(out) = routed.lookup {
            if let Err(e) = self.udp.send_to(&out.packet.encode(), out.dest).await {
                warn!(to = %out.dest, error = %e, "Lookup send failed");
            }
        }
    }

    /// Drain one full HTTP request from the client, or give up after the
    /// configured number of failed read attempts.
    async fn read_request(&mut self, stream: &mut TcpStream) -> Option<Vec<u8>> {
        let per_read = Duration::from_millis(self.config.tunables.client_read_timeout_ms);
        let mut attempts_left = self.config.tunables.receive_attempts;
        let mut buf = Vec::with_capacity(1024);

        loop {
            match tokio::time::timeout(per_read, stream.read_buf(&mut buf)).await {
                Ok(Ok(0)) => return None,
                Ok(Ok(_)) => {
                    if codec::request_is_complete(&buf) {
                        return Some(buf);
                    }
                    if buf.len() > MAX_REQUEST_BYTES {
                        debug!(len = buf.len(), "Request too large, closing client");
                        return None;
                    }
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "Client read failed");
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 {
                        return None;
                    }
                }
                Err(_) => {
                    debug!("Client read timed out");
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 {
                        return None;
                    }
                }
            }
        }
    }

    /// Decode and process one inbound control datagram.
    async fn handle_datagram(&mut self, bytes: &[u8], src: SocketAddr) {
        let pkt = match Packet::decode(bytes) {
            Ok(pkt) => pkt,
            Err(e) => {
                debug!(from = %src, error = %e, "Dropping malformed packet");
                return;
            }
        };

        let Some(node) = &mut self.node else {
            debug!(from = %src, "Control packet outside ring mode, dropping");
            return;
        };

        if let Some(out) = protocol::handle_packet(node, pkt) {
            if let Err(e) = self.udp.send_to(&out.packet.encode(), out.dest).await {
                warn!(to = %out.dest, error = %e, "UDP send failed");
            }
        }
    }
}
