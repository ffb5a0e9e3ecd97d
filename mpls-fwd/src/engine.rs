use std::sync::atomic::{AtomicBool, Ordering};

use arrayvec::ArrayVec;
use tracing::{debug, info, warn};

use mpls_pkt::mpls::MplsHeader;

use crate::error::*;
use crate::mbuf::free_batch;
use crate::port::{Port, RxQueue, TxQueue};
use crate::stream::FwdStream;
use crate::transform::{insert_header_burst, strip_header_burst};

/// Maximum number of mbufs received or transmitted in one call.
pub const MAX_PKT_BURST: usize = 32;

/// Counters for one forwarding direction.
///
/// `rx_pkts == tx_pkts + tx_dropped + dropped` always holds at a phase
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirStats {
    pub rx_pkts: u64,
    pub tx_pkts: u64,
    /// Mbufs the tx queue did not accept.
    pub tx_dropped: u64,
    /// Mbufs the transform rejected and released.
    pub dropped: u64,
    /// Mbufs the transform rejected but forwarded unmodified.
    pub passed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// Ingress rx to egress tx, label pushed.
    pub encap: DirStats,
    /// Egress rx to ingress tx, label popped.
    pub decap: DirStats,
}

/// The forwarding loop of one stream.
///
/// A worker owns the four queues of its stream and nothing else, so workers
/// of different streams never synchronize with each other.
pub struct FwdWorker<P: Port> {
    stream: FwdStream,
    header: MplsHeader,
    ingress_rxq: P::RxQueue,
    ingress_txq: P::TxQueue,
    egress_rxq: P::RxQueue,
    egress_txq: P::TxQueue,
    batch: ArrayVec<P::Mbuf, MAX_PKT_BURST>,
    stats: StreamStats,
    // numa sockets of the ingress and egress ports
    port_sockets: [Option<u32>; 2],
}

impl<P: Port> FwdWorker<P> {
    /// Take the queues `stream` was assigned on the two ports.
    pub fn new(stream: FwdStream, ingress: &P, egress: &P) -> Result<Self> {
        if ingress.port_id() != stream.ingress.port_id || egress.port_id() != stream.egress.port_id
        {
            return Error::config_err(format!(
                "stream on lcore {} expects ports {}/{}, got {}/{}",
                stream.lcore_id,
                stream.ingress.port_id,
                stream.egress.port_id,
                ingress.port_id(),
                egress.port_id()
            ))
            .to_err();
        }

        Ok(Self {
            stream,
            header: stream.mpls_header(),
            ingress_rxq: ingress.rx_queue(stream.ingress.rx_queue_id)?,
            ingress_txq: ingress.tx_queue(stream.ingress.tx_queue_id)?,
            egress_rxq: egress.rx_queue(stream.egress.rx_queue_id)?,
            egress_txq: egress.tx_queue(stream.egress.tx_queue_id)?,
            batch: ArrayVec::new(),
            stats: StreamStats::default(),
            port_sockets: [ingress.socket_id(), egress.socket_id()],
        })
    }

    pub fn stream(&self) -> &FwdStream {
        &self.stream
    }

    pub fn header(&self) -> MplsHeader {
        self.header
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Ids of the stream ports attached to a NUMA socket other than
    /// `socket_id`, warning about each of them. Ports on an unknown socket
    /// are never reported.
    pub fn check_numa(&self, socket_id: u32) -> Vec<u16> {
        let ports = [self.stream.ingress.port_id, self.stream.egress.port_id];
        let mut remote = Vec::new();
        for (port_id, port_socket) in ports.into_iter().zip(self.port_sockets) {
            match port_socket {
                Some(port_socket) if port_socket != socket_id => {
                    warn!(
                        lcore = self.stream.lcore_id,
                        port = port_id,
                        port_socket,
                        lcore_socket = socket_id,
                        "port is on a remote numa node, performance will not be optimal"
                    );
                    remote.push(port_id);
                }
                _ => {}
            }
        }
        remote
    }

    /// Run one ingress-to-egress burst. Returns the number of mbufs received.
    pub fn poll_encap(&mut self) -> usize {
        let nb_rx = self.ingress_rxq.rx(&mut self.batch);
        if nb_rx == 0 {
            return 0;
        }

        let outcome = insert_header_burst(&mut self.batch, self.header);
        let nb_tx = self.egress_txq.tx(&mut self.batch);
        let nb_drop = free_batch(&mut self.batch);
        if nb_drop > 0 {
            debug!(
                lcore = self.stream.lcore_id,
                port = self.stream.egress.port_id,
                nb_drop,
                "egress tx queue full, dropping"
            );
        }

        let stats = &mut self.stats.encap;
        stats.rx_pkts += nb_rx as u64;
        stats.tx_pkts += nb_tx as u64;
        stats.tx_dropped += nb_drop as u64;
        stats.dropped += outcome.failed as u64;
        nb_rx
    }

    /// Run one egress-to-ingress burst. Returns the number of mbufs received.
    pub fn poll_decap(&mut self) -> usize {
        let nb_rx = self.egress_rxq.rx(&mut self.batch);
        if nb_rx == 0 {
            return 0;
        }

        let outcome = strip_header_burst(&mut self.batch);
        let nb_tx = self.ingress_txq.tx(&mut self.batch);
        let nb_drop = free_batch(&mut self.batch);
        if nb_drop > 0 {
            debug!(
                lcore = self.stream.lcore_id,
                port = self.stream.ingress.port_id,
                nb_drop,
                "ingress tx queue full, dropping"
            );
        }

        let stats = &mut self.stats.decap;
        stats.rx_pkts += nb_rx as u64;
        stats.tx_pkts += nb_tx as u64;
        stats.tx_dropped += nb_drop as u64;
        stats.passed += outcome.failed as u64;
        nb_rx
    }

    /// Forward in both directions until `stop` is raised.
    ///
    /// The flag is checked before each encapsulating burst and again before
    /// each decapsulating burst, so a raised flag is honored after at most
    /// one burst per direction. A burst in flight always completes.
    pub fn run(&mut self, stop: &AtomicBool) -> StreamStats {
        info!(
            lcore = self.stream.lcore_id,
            label = self.header.label(),
            ttl = self.header.ttl(),
            "starting packet forwarding"
        );
        if self.stream.verbose {
            info!(
                lcore = self.stream.lcore_id,
                in_port = self.stream.ingress.port_id,
                in_rxq = self.stream.ingress.rx_queue_id,
                in_txq = self.stream.ingress.tx_queue_id,
                out_port = self.stream.egress.port_id,
                out_rxq = self.stream.egress.rx_queue_id,
                out_txq = self.stream.egress.tx_queue_id,
                "stream queues"
            );
        }

        while !stop.load(Ordering::Acquire) {
            self.poll_encap();

            if stop.load(Ordering::Acquire) {
                break;
            }

            self.poll_decap();
        }

        info!(
            lcore = self.stream.lcore_id,
            encap_tx = self.stats.encap.tx_pkts,
            decap_tx = self.stats.decap.tx_pkts,
            "packet forwarding stopped"
        );
        self.stats
    }
}

impl<P: Port> std::fmt::Debug for FwdWorker<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FwdWorker")
            .field("stream", &self.stream)
            .field("header", &self.header)
            .field("stats", &self.stats)
            .finish()
    }
}
