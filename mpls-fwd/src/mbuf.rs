use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::mempool::PoolSlot;

/// A packet buffer handed out by the packet-I/O runtime.
///
/// Read access is always available. Moving the data start or writing the data
/// region goes through [`MbufMut`], which an implementation must only hand out
/// while it is the sole owner of a direct, single-segment buffer.
pub trait Mbuf {
    /// Length of the data in the first segment.
    fn data_len(&self) -> usize;

    /// Length of the whole packet, all segments included.
    fn pkt_len(&self) -> usize;

    /// Unused bytes in front of the data.
    fn headroom(&self) -> usize;

    /// Number of references to the underlying buffer memory.
    fn refcnt(&self) -> u16;

    /// Whether the mbuf owns its buffer memory, as opposed to being an
    /// indirect view attached to another mbuf.
    fn is_direct(&self) -> bool;

    /// Number of chained segments.
    fn nb_segs(&self) -> u16 {
        1
    }

    /// Data of the first segment.
    fn data(&self) -> &[u8];

    /// Get the exclusive handle, or `None` if [`is_exclusive`](Mbuf::is_exclusive)
    /// does not hold.
    fn try_mut(&mut self) -> Option<MbufMut<'_>>;

    #[inline]
    fn is_exclusive(&self) -> bool {
        self.refcnt() == 1 && self.is_direct() && self.nb_segs() == 1
    }
}

/// Write access to an exclusively owned, single-segment mbuf.
///
/// It borrows the buffer memory and the offset/length fields of the mbuf it
/// was obtained from, the same fields `rte_pktmbuf_prepend` and
/// `rte_pktmbuf_adj` update.
#[derive(Debug)]
pub struct MbufMut<'a> {
    room: &'a mut [u8],
    data_off: &'a mut u16,
    data_len: &'a mut u16,
    pkt_len: &'a mut u32,
}

impl<'a> MbufMut<'a> {
    /// # Panic:
    /// This function panics if the data region does not lie inside `room`.
    pub fn new(
        room: &'a mut [u8],
        data_off: &'a mut u16,
        data_len: &'a mut u16,
        pkt_len: &'a mut u32,
    ) -> Self {
        assert!(usize::from(*data_off) + usize::from(*data_len) <= room.len());
        Self {
            room,
            data_off,
            data_len,
            pkt_len,
        }
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        usize::from(*self.data_len)
    }

    #[inline]
    pub fn headroom(&self) -> usize {
        usize::from(*self.data_off)
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        let start = self.headroom();
        &self.room[start..start + self.data_len()]
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        let start = self.headroom();
        let end = start + self.data_len();
        &mut self.room[start..end]
    }

    /// Grow the data region `cnt` bytes to the front and return the new data.
    ///
    /// Returns `None` and leaves the mbuf untouched if the headroom is too small.
    #[inline]
    pub fn prepend(&mut self, cnt: usize) -> Option<&mut [u8]> {
        if cnt > self.headroom() || self.data_len() + cnt > usize::from(u16::MAX) {
            return None;
        }
        *self.data_off -= cnt as u16;
        *self.data_len += cnt as u16;
        *self.pkt_len += cnt as u32;
        Some(self.data_mut())
    }

    /// Drop `cnt` bytes from the front of the data region and return the
    /// remaining data.
    ///
    /// Returns `None` and leaves the mbuf untouched if the data is too short.
    #[inline]
    pub fn adj(&mut self, cnt: usize) -> Option<&mut [u8]> {
        if cnt > self.data_len() {
            return None;
        }
        *self.data_off += cnt as u16;
        *self.data_len -= cnt as u16;
        *self.pkt_len -= cnt as u32;
        Some(self.data_mut())
    }
}

/// Release every mbuf left in `batch`, returning how many were freed.
#[inline]
pub fn free_batch<M, const N: usize>(batch: &mut ArrayVec<M, N>) -> usize {
    let nb = batch.len();
    batch.clear();
    nb
}

/// A single-segment mbuf backed by heap memory.
///
/// The buffer memory is reference counted: [`clone_indirect`](HeapMbuf::clone_indirect)
/// attaches a second, indirect mbuf to the same memory, which raises `refcnt`
/// on both until one of them is dropped.
#[derive(Debug)]
pub struct HeapMbuf {
    room: Arc<[u8]>,
    data_off: u16,
    data_len: u16,
    pkt_len: u32,
    direct: bool,
    // held while the mbuf is out of its pool
    slot: PoolSlot,
}

impl HeapMbuf {
    pub(crate) fn new(headroom: u16, dataroom: u16, slot: PoolSlot) -> Self {
        let room: Vec<u8> = vec![0; usize::from(headroom) + usize::from(dataroom)];
        Self {
            room: Arc::from(room),
            data_off: headroom,
            data_len: 0,
            pkt_len: 0,
            direct: true,
            slot,
        }
    }

    /// Free space behind the data.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.room.len() - usize::from(self.data_off) - usize::from(self.data_len)
    }

    /// # Panic:
    /// This function panics if the mbuf is shared or if the length of the slice
    /// exceeds the capacity of the mbuf.
    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        assert!(self.capacity() >= slice.len());
        let start = usize::from(self.data_off) + usize::from(self.data_len);
        let Some(room) = Arc::get_mut(&mut self.room) else {
            panic!("extend_from_slice on a shared mbuf");
        };
        room[start..start + slice.len()].copy_from_slice(slice);
        self.data_len += slice.len() as u16;
        self.pkt_len += slice.len() as u32;
    }

    /// Attach an indirect mbuf to the memory of this one, the way
    /// `rte_pktmbuf_clone` does.
    pub fn clone_indirect(&self) -> HeapMbuf {
        Self {
            room: self.room.clone(),
            data_off: self.data_off,
            data_len: self.data_len,
            pkt_len: self.pkt_len,
            direct: false,
            slot: self.slot.clone(),
        }
    }
}

impl Mbuf for HeapMbuf {
    #[inline]
    fn data_len(&self) -> usize {
        usize::from(self.data_len)
    }

    #[inline]
    fn pkt_len(&self) -> usize {
        self.pkt_len as usize
    }

    #[inline]
    fn headroom(&self) -> usize {
        usize::from(self.data_off)
    }

    #[inline]
    fn refcnt(&self) -> u16 {
        u16::try_from(Arc::strong_count(&self.room)).unwrap_or(u16::MAX)
    }

    #[inline]
    fn is_direct(&self) -> bool {
        self.direct
    }

    #[inline]
    fn data(&self) -> &[u8] {
        let start = usize::from(self.data_off);
        &self.room[start..start + usize::from(self.data_len)]
    }

    #[inline]
    fn try_mut(&mut self) -> Option<MbufMut<'_>> {
        if !self.direct {
            return None;
        }
        let room = Arc::get_mut(&mut self.room)?;
        Some(MbufMut::new(
            room,
            &mut self.data_off,
            &mut self.data_len,
            &mut self.pkt_len,
        ))
    }
}
