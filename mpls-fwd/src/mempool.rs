use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::*;
use crate::mbuf::HeapMbuf;

#[derive(Clone, Copy, Debug)]
pub struct MempoolConf {
    pub nb_mbufs: u32,
    pub headroom: u16,
    pub dataroom: u16,
}

impl MempoolConf {
    pub const HEADROOM: u16 = 128;
    pub const DATAROOM: u16 = 2048;
    // the optimum size is when n = (2^q - 1)
    pub const NB_MBUFS: u32 = 8191;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nb_mbufs(&mut self, val: u32) {
        self.nb_mbufs = val;
    }

    pub fn set_headroom(&mut self, val: u16) {
        self.headroom = val;
    }

    pub fn set_dataroom(&mut self, val: u16) {
        self.dataroom = val;
    }
}

impl Default for MempoolConf {
    fn default() -> Self {
        Self {
            nb_mbufs: Self::NB_MBUFS,
            headroom: Self::HEADROOM,
            dataroom: Self::DATAROOM,
        }
    }
}

/// One reserved buffer slot of a pool, given back when dropped.
///
/// Cloning reserves another slot without checking the pool bound, which is
/// how an indirect mbuf is accounted for.
#[derive(Debug)]
pub(crate) struct PoolSlot {
    counter: Arc<AtomicUsize>,
}

impl PoolSlot {
    /// Reserve a slot on `counter` unless `capacity` slots are already taken.
    ///
    /// The check and the increment are a single atomic step, so concurrent
    /// callers can never push the count past `capacity`.
    pub(crate) fn reserve(counter: &Arc<AtomicUsize>, capacity: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .ok()?;
        Some(Self {
            counter: counter.clone(),
        })
    }
}

impl Clone for PoolSlot {
    fn clone(&self) -> Self {
        self.counter.fetch_add(1, Ordering::AcqRel);
        Self {
            counter: self.counter.clone(),
        }
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A bounded pool of [`HeapMbuf`]s.
///
/// Every mbuf handed out holds a pool slot until it is dropped, so
/// `in_use` reports exactly how many buffers have not been released yet.
#[derive(Debug)]
pub struct Mempool {
    conf: MempoolConf,
    counter: Arc<AtomicUsize>,
}

impl Mempool {
    pub fn try_create(conf: &MempoolConf) -> Result<Self> {
        if conf.nb_mbufs == 0 {
            return Error::config_err("mempool must hold at least one mbuf").to_err();
        }
        conf.dataroom
            .checked_add(conf.headroom)
            .ok_or_else(|| Error::config_err("invalid mempool config"))?;

        Ok(Self {
            conf: *conf,
            counter: Arc::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub fn try_alloc(&self) -> Option<HeapMbuf> {
        let slot = PoolSlot::reserve(&self.counter, self.conf.nb_mbufs as usize)?;
        Some(HeapMbuf::new(self.conf.headroom, self.conf.dataroom, slot))
    }

    /// Allocate an mbuf holding a copy of `frame`.
    pub fn alloc_frame(&self, frame: &[u8]) -> Option<HeapMbuf> {
        if frame.len() > usize::from(self.conf.dataroom) {
            return None;
        }
        let mut mbuf = self.try_alloc()?;
        mbuf.extend_from_slice(frame);
        Some(mbuf)
    }

    /// Number of mbufs (direct and indirect) that have not been released.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    #[inline]
    pub fn nb_mbufs(&self) -> u32 {
        self.conf.nb_mbufs
            .saturating_sub(u32::try_from(self.in_use()).unwrap_or(u32::MAX))
    }

    pub fn conf(&self) -> &MempoolConf {
        &self.conf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbuf::Mbuf;

    #[test]
    fn alloc_until_exhausted() {
        let mut conf = MempoolConf::new();
        conf.set_nb_mbufs(4);
        let mp = Mempool::try_create(&conf).unwrap();

        let mut v = Vec::new();
        while let Some(mbuf) = mp.try_alloc() {
            v.push(mbuf);
        }
        assert_eq!(v.len(), 4);
        assert_eq!(mp.in_use(), 4);
        assert_eq!(mp.nb_mbufs(), 0);

        v.pop();
        assert_eq!(mp.in_use(), 3);
        assert!(mp.try_alloc().is_some());
    }

    #[test]
    fn alloc_frame_copies_data() {
        let mp = Mempool::try_create(&MempoolConf::default()).unwrap();
        let mbuf = mp.alloc_frame(&[0xaa; 60]).unwrap();
        assert_eq!(mbuf.data(), &[0xaa; 60][..]);
        assert_eq!(mbuf.headroom(), usize::from(MempoolConf::HEADROOM));

        let indirect = mbuf.clone_indirect();
        assert_eq!(mp.in_use(), 2);
        drop(mbuf);
        drop(indirect);
        assert_eq!(mp.in_use(), 0);

        assert!(mp.alloc_frame(&[0; 4096]).is_none());
    }

    #[test]
    fn invalid_conf() {
        let mut conf = MempoolConf::new();
        conf.set_nb_mbufs(0);
        assert!(Mempool::try_create(&conf).is_err());

        let mut conf = MempoolConf::new();
        conf.set_headroom(u16::MAX);
        assert!(Mempool::try_create(&conf).is_err());
    }

    #[test]
    fn concurrent_alloc_respects_bound() {
        const NB_MBUFS: u32 = 16;
        const NB_THREADS: usize = 8;

        let mut conf = MempoolConf::new();
        conf.set_nb_mbufs(NB_MBUFS);
        let mp = &Mempool::try_create(&conf).unwrap();
        let barrier = &std::sync::Barrier::new(NB_THREADS);

        for _ in 0..50 {
            let held: Vec<Vec<HeapMbuf>> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..NB_THREADS)
                    .map(|_| {
                        s.spawn(move || {
                            barrier.wait();
                            let mut v = Vec::new();
                            for _ in 0..NB_MBUFS {
                                if let Some(mbuf) = mp.try_alloc() {
                                    v.push(mbuf);
                                }
                            }
                            v
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let total: usize = held.iter().map(Vec::len).sum();
            assert_eq!(total, NB_MBUFS as usize);
            assert_eq!(mp.in_use(), NB_MBUFS as usize);
            assert!(mp.try_alloc().is_none());

            drop(held);
            assert_eq!(mp.in_use(), 0);
        }
    }
}
