//! In-place MPLS push and pop on received mbufs.
//!
//! Only untagged Ethernet II frames with a single label entry are handled:
//! VLAN tags are not looked through and a label stack is not walked.

use arrayvec::ArrayVec;
use tracing::{debug, warn};

use mpls_pkt::ether::{EtherHeader, EtherType, ETHER_HEADER_LEN, ETHER_MIN_LEN};
use mpls_pkt::mpls::{MplsHeader, MPLS_HEADER_LEN};

use crate::error::*;
use crate::mbuf::Mbuf;

const IP_VERSION_MASK: u8 = 0xf0;
const IP4_VERSION: u8 = 0x40;
const IP6_VERSION: u8 = 0x60;

/// Guess the ethertype of the network-layer payload from its ip version nibble.
///
/// The byte inspected is the first one after the Ethernet header, or after the
/// label entry if the frame is MPLS. Anything that is not ipv4 or ipv6, including
/// a frame too short to reach that byte, yields `None`.
pub fn deduce_ethertype(frame: &[u8]) -> Option<EtherType> {
    let eth = EtherHeader::parse(frame).ok()?;
    let offset = if eth.ethertype().is_mpls() {
        MPLS_HEADER_LEN
    } else {
        0
    };

    match eth.payload().get(offset)? & IP_VERSION_MASK {
        IP4_VERSION => Some(EtherType::IPV4),
        IP6_VERSION => Some(EtherType::IPV6),
        _ => None,
    }
}

/// Pop the label entry that follows the Ethernet header and restore the
/// payload ethertype.
///
/// A frame that is not MPLS is left alone and reported as success. On any
/// error the mbuf is not modified.
pub fn strip_header<M: Mbuf>(mbuf: &mut M) -> Result<()> {
    let frame = mbuf.data();
    let Ok(eth) = EtherHeader::parse(frame) else {
        return Error::insufficient_buffer(format!(
            "datalen={} is shorter than the ethernet header",
            frame.len()
        ))
        .to_err();
    };
    if !eth.ethertype().is_mpls() {
        return Ok(());
    }
    let ethertype = deduce_ethertype(frame).ok_or_else(Error::unknown_payload)?;

    let mut m = mbuf.try_mut().ok_or_else(Error::shared_buffer)?;
    if m.data_len() < ETHER_HEADER_LEN + MPLS_HEADER_LEN {
        return Error::insufficient_buffer(format!(
            "datalen={} cannot hold an mpls header",
            m.data_len()
        ))
        .to_err();
    }

    // slide the ethernet header over the label entry, then cut the old front
    m.data_mut()
        .copy_within(0..ETHER_HEADER_LEN, MPLS_HEADER_LEN);
    let data = m
        .adj(MPLS_HEADER_LEN)
        .ok_or_else(|| Error::insufficient_buffer("unable to trim the mbuf front"))?;
    EtherHeader::parse_unchecked(data).set_ethertype(ethertype);

    Ok(())
}

/// Push `hdr` between the Ethernet header and its payload, and switch the
/// ethertype to MPLS.
///
/// On any error the mbuf is not modified.
pub fn insert_header<M: Mbuf>(mbuf: &mut M, hdr: MplsHeader) -> Result<()> {
    if !mbuf.is_exclusive() {
        return Error::shared_buffer().to_err();
    }

    // the first segment is too short
    if mbuf.data_len() < ETHER_MIN_LEN {
        return Error::insufficient_buffer(format!(
            "datalen={}, pktlen={}, refcnt={}, segments={}",
            mbuf.data_len(),
            mbuf.pkt_len(),
            mbuf.refcnt(),
            mbuf.nb_segs()
        ))
        .to_err();
    }

    let mut m = mbuf.try_mut().ok_or_else(Error::shared_buffer)?;
    let headroom = m.headroom();
    let data = m.prepend(MPLS_HEADER_LEN).ok_or_else(|| {
        Error::insufficient_buffer(format!("headroom={} cannot fit an mpls header", headroom))
    })?;

    data.copy_within(MPLS_HEADER_LEN..MPLS_HEADER_LEN + ETHER_HEADER_LEN, 0);
    EtherHeader::parse_unchecked(&mut data[..]).set_ethertype(EtherType::MPLS);
    hdr.write_to(&mut data[ETHER_HEADER_LEN..]);

    Ok(())
}

/// Result of running a transform over a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BurstOutcome {
    pub processed: usize,
    pub failed: usize,
}

/// Push `hdr` onto every mbuf of the burst.
///
/// Mbufs that cannot be labeled are logged, removed from `batch` and released.
/// The survivors keep their order.
pub fn insert_header_burst<M: Mbuf, const N: usize>(
    batch: &mut ArrayVec<M, N>,
    hdr: MplsHeader,
) -> BurstOutcome {
    let nb_pkts = batch.len();
    let mut idx = 0;
    batch.retain(|mbuf| {
        let res = insert_header(mbuf, hdr);
        if let Err(e) = &res {
            warn!(idx, nb_pkts, error = %e, "unable to add mpls header, dropping mbuf");
        }
        idx += 1;
        res.is_ok()
    });

    BurstOutcome {
        processed: batch.len(),
        failed: nb_pkts - batch.len(),
    }
}

/// Pop the label entry from every mbuf of the burst.
///
/// Mbufs that cannot be stripped stay in `batch` unmodified and are forwarded
/// as they are.
pub fn strip_header_burst<M: Mbuf, const N: usize>(batch: &mut ArrayVec<M, N>) -> BurstOutcome {
    let nb_pkts = batch.len();
    let mut failed = 0;
    for (idx, mbuf) in batch.iter_mut().enumerate() {
        if let Err(e) = strip_header(mbuf) {
            failed += 1;
            if e.kind() == ErrorKind::UnknownPayload {
                debug!(idx, nb_pkts, "ignoring mpls frame with unknown payload");
            } else {
                warn!(idx, nb_pkts, error = %e, "unable to remove mpls header");
            }
        }
    }

    BurstOutcome {
        processed: nb_pkts - failed,
        failed,
    }
}
