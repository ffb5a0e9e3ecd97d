use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use arrayvec::ArrayVec;

use crate::error::*;
use crate::mbuf::Mbuf;

/// Receive side of one port queue.
pub trait RxQueue {
    type Mbuf: Mbuf;

    /// Append up to the free space of `batch` received mbufs, without blocking.
    /// Returns how many were appended.
    fn rx<const N: usize>(&mut self, batch: &mut ArrayVec<Self::Mbuf, N>) -> usize;
}

/// Transmit side of one port queue.
pub trait TxQueue {
    type Mbuf: Mbuf;

    /// Hand the front of `batch` to the device, without blocking.
    ///
    /// Returns how many mbufs were accepted. The rejected ones stay in `batch`,
    /// moved to its front, and remain owned by the caller.
    fn tx<const N: usize>(&mut self, batch: &mut ArrayVec<Self::Mbuf, N>) -> usize;
}

/// A started port with per-lcore queue pairs.
///
/// Each queue can be taken once: a second `rx_queue`/`tx_queue` call for the
/// same id fails until the first handle is dropped.
pub trait Port {
    type Mbuf: Mbuf + Send;
    type RxQueue: RxQueue<Mbuf = Self::Mbuf> + Send;
    type TxQueue: TxQueue<Mbuf = Self::Mbuf> + Send;

    fn port_id(&self) -> u16;

    /// NUMA socket the port is attached to, `None` when unknown.
    fn socket_id(&self) -> Option<u32> {
        None
    }

    fn rx_queue(&self, qid: u16) -> Result<Self::RxQueue>;

    fn tx_queue(&self, qid: u16) -> Result<Self::TxQueue>;
}

#[derive(Clone, Copy, Debug)]
pub struct RingConf {
    pub nb_queues: u16,
    pub nb_rx_desc: usize,
    pub nb_tx_desc: usize,
    pub socket_id: Option<u32>,
}

impl RingConf {
    pub const NB_RX_DESC: usize = 1024;
    pub const NB_TX_DESC: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nb_queues(&mut self, val: u16) {
        self.nb_queues = val;
    }

    pub fn set_nb_rx_desc(&mut self, val: usize) {
        self.nb_rx_desc = val;
    }

    pub fn set_nb_tx_desc(&mut self, val: usize) {
        self.nb_tx_desc = val;
    }

    pub fn set_socket_id(&mut self, val: u32) {
        self.socket_id = Some(val);
    }
}

impl Default for RingConf {
    fn default() -> Self {
        Self {
            nb_queues: 1,
            nb_rx_desc: Self::NB_RX_DESC,
            nb_tx_desc: Self::NB_TX_DESC,
            socket_id: None,
        }
    }
}

#[derive(Debug)]
struct Ring<M> {
    slots: Mutex<VecDeque<M>>,
    capacity: usize,
}

impl<M> Ring<M> {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<M>> {
        // a panicking holder cannot leave the deque half-updated
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An in-memory port: every queue id owns a bounded rx ring and a bounded tx
/// ring.
///
/// The "wire" side is driven through [`inject`](RingPort::inject) (puts a
/// frame on an rx ring) and [`drain`](RingPort::drain) (takes everything the
/// forwarder transmitted on a tx ring).
#[derive(Debug)]
pub struct RingPort<M> {
    port_id: u16,
    socket_id: Option<u32>,
    rxqs: Vec<RingRxQueue<M>>,
    txqs: Vec<RingTxQueue<M>>,
}

impl<M: Mbuf> RingPort<M> {
    pub fn new(port_id: u16, conf: &RingConf) -> Result<Self> {
        if conf.nb_queues == 0 || conf.nb_rx_desc == 0 || conf.nb_tx_desc == 0 {
            return Error::config_err("invalid ring port config").to_err();
        }
        let rxqs = (0..conf.nb_queues)
            .map(|qid| RingRxQueue {
                port_id,
                qid,
                ring: Ring::new(conf.nb_rx_desc),
                counter: Arc::new(()),
            })
            .collect();
        let txqs = (0..conf.nb_queues)
            .map(|qid| RingTxQueue {
                port_id,
                qid,
                ring: Ring::new(conf.nb_tx_desc),
                counter: Arc::new(()),
            })
            .collect();

        Ok(Self {
            port_id,
            socket_id: conf.socket_id,
            rxqs,
            txqs,
        })
    }

    pub fn nb_queues(&self) -> u16 {
        self.rxqs.len() as u16
    }

    /// Put `mbuf` on the rx ring of queue `qid`, handing it back if the ring is
    /// full or the queue does not exist.
    pub fn inject(&self, qid: u16, mbuf: M) -> std::result::Result<(), M> {
        let Some(rxq) = self.rxqs.get(usize::from(qid)) else {
            return Err(mbuf);
        };
        let mut slots = rxq.ring.lock();
        if slots.len() >= rxq.ring.capacity {
            return Err(mbuf);
        }
        slots.push_back(mbuf);
        Ok(())
    }

    /// Take every mbuf transmitted on queue `qid`, oldest first.
    pub fn drain(&self, qid: u16) -> Vec<M> {
        match self.txqs.get(usize::from(qid)) {
            Some(txq) => txq.ring.lock().drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Number of mbufs waiting on the rx ring of queue `qid`.
    pub fn rx_pending(&self, qid: u16) -> usize {
        self.rxqs
            .get(usize::from(qid))
            .map_or(0, |rxq| rxq.ring.lock().len())
    }
}

impl<M: Mbuf + Send> Port for RingPort<M> {
    type Mbuf = M;
    type RxQueue = RingRxQueue<M>;
    type TxQueue = RingTxQueue<M>;

    fn port_id(&self) -> u16 {
        self.port_id
    }

    fn socket_id(&self) -> Option<u32> {
        self.socket_id
    }

    fn rx_queue(&self, qid: u16) -> Result<RingRxQueue<M>> {
        self.rxqs
            .get(usize::from(qid))
            .ok_or_else(|| Error::service_err(format!("invalid rx queue id {}", qid)))?
            .clone_once()
    }

    fn tx_queue(&self, qid: u16) -> Result<RingTxQueue<M>> {
        self.txqs
            .get(usize::from(qid))
            .ok_or_else(|| Error::service_err(format!("invalid tx queue id {}", qid)))?
            .clone_once()
    }
}

#[derive(Debug)]
pub struct RingRxQueue<M> {
    port_id: u16,
    qid: u16,
    ring: Arc<Ring<M>>,
    counter: Arc<()>,
}

impl<M> RingRxQueue<M> {
    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn qid(&self) -> u16 {
        self.qid
    }

    fn clone_once(&self) -> Result<RingRxQueue<M>> {
        if self.in_use() {
            return Error::service_err("rx queue is in use").to_err();
        }

        Ok(RingRxQueue {
            port_id: self.port_id,
            qid: self.qid,
            ring: self.ring.clone(),
            counter: self.counter.clone(),
        })
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }
}

impl<M: Mbuf> RxQueue for RingRxQueue<M> {
    type Mbuf = M;

    #[inline]
    fn rx<const N: usize>(&mut self, batch: &mut ArrayVec<M, N>) -> usize {
        let mut slots = self.ring.lock();
        let nb_rx = slots.len().min(batch.remaining_capacity());
        batch.extend(slots.drain(..nb_rx));
        nb_rx
    }
}

#[derive(Debug)]
pub struct RingTxQueue<M> {
    port_id: u16,
    qid: u16,
    ring: Arc<Ring<M>>,
    counter: Arc<()>,
}

impl<M> RingTxQueue<M> {
    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn qid(&self) -> u16 {
        self.qid
    }

    fn clone_once(&self) -> Result<RingTxQueue<M>> {
        if self.in_use() {
            return Error::service_err("tx queue is in use").to_err();
        }

        Ok(RingTxQueue {
            port_id: self.port_id,
            qid: self.qid,
            ring: self.ring.clone(),
            counter: self.counter.clone(),
        })
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.counter) != 1
    }
}

impl<M: Mbuf> TxQueue for RingTxQueue<M> {
    type Mbuf = M;

    #[inline]
    fn tx<const N: usize>(&mut self, batch: &mut ArrayVec<M, N>) -> usize {
        let mut slots = self.ring.lock();
        let free = self.ring.capacity.saturating_sub(slots.len());
        let nb_tx = batch.len().min(free);
        slots.extend(batch.drain(..nb_tx));
        nb_tx
    }
}
