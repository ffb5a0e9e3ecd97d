//! MPLS (Multiprotocol Label Switching) shim header, as defined in RFC 3032.
//!
//! A label stack entry is 32 bits long and is carried in network byte order
//! between the link-layer header and the network-layer payload:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                Label                  | TC  |S|      TTL      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! - **Label**: 20-bit label value used for forwarding decisions
//! - **Traffic Class (TC)**: 3-bit field, formerly the EXP bits
//! - **End of Stack (S)**: set on the bottom-most label of the stack
//! - **TTL**: 8-bit time to live
//!
//! [`MplsHeader`] is a host-order value type. Every setter masks its input to
//! the field width, so an out-of-range value is truncated rather than rejected.
//! Range checks belong to whoever produces the value.
//!
//! # Example
//!
//! ```rust
//! use mpls_pkt::mpls::MplsHeader;
//!
//! let mut hdr = MplsHeader::default();
//! hdr.set_label(16);
//! hdr.set_eos(1);
//! hdr.set_ttl(64);
//!
//! assert_eq!(hdr.to_be_bytes(), [0x00, 0x01, 0x01, 0x40]);
//! assert_eq!(MplsHeader::from_be_bytes(hdr.to_be_bytes()), hdr);
//! ```

#![allow(missing_docs)]

use byteorder::{ByteOrder, NetworkEndian};

/// A constant that defines the fixed byte length of the Mpls protocol header.
pub const MPLS_HEADER_LEN: usize = 4;

/// Bit position of the label field.
pub const MPLS_LABEL_SHIFT: u32 = 12;
/// Width mask of the label field.
pub const MPLS_LABEL_MASK: u32 = 0x000f_ffff;

/// Bit position of the traffic class field.
pub const MPLS_TC_SHIFT: u32 = 9;
/// Width mask of the traffic class field.
pub const MPLS_TC_MASK: u32 = 0x07;

/// Bit position of the end-of-stack bit.
pub const MPLS_EOS_SHIFT: u32 = 8;
/// Width mask of the end-of-stack bit.
pub const MPLS_EOS_MASK: u32 = 0x01;

/// Bit position of the ttl field.
pub const MPLS_TTL_SHIFT: u32 = 0;
/// Width mask of the ttl field.
pub const MPLS_TTL_MASK: u32 = 0xff;

/// A 32-bit MPLS label stack entry in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MplsHeader(u32);

impl MplsHeader {
    /// Build a header from its four fields, masking each one to its width.
    #[inline]
    pub const fn new(label: u32, tc: u32, eos: u32, ttl: u32) -> Self {
        Self(
            ((label & MPLS_LABEL_MASK) << MPLS_LABEL_SHIFT)
                | ((tc & MPLS_TC_MASK) << MPLS_TC_SHIFT)
                | ((eos & MPLS_EOS_MASK) << MPLS_EOS_SHIFT)
                | ((ttl & MPLS_TTL_MASK) << MPLS_TTL_SHIFT),
        )
    }

    /// The bottom-of-stack entry a single-label stream pushes on every packet.
    #[inline]
    pub const fn bottom_of_stack(label: u32, ttl: u32) -> Self {
        Self::new(label, 0, 1, ttl)
    }

    /// Wrap a raw host-order value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw host-order value.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Decode a header from its wire representation.
    #[inline]
    pub fn from_be_bytes(bytes: [u8; MPLS_HEADER_LEN]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// Encode the header into its wire representation.
    #[inline]
    pub fn to_be_bytes(&self) -> [u8; MPLS_HEADER_LEN] {
        self.0.to_be_bytes()
    }

    /// Write the header into the first four bytes of `buf`.
    ///
    /// # Panics
    /// Panics if `buf` is shorter than [`MPLS_HEADER_LEN`].
    #[inline]
    pub fn write_to(&self, buf: &mut [u8]) {
        NetworkEndian::write_u32(&mut buf[..MPLS_HEADER_LEN], self.0);
    }

    #[inline]
    pub const fn label(&self) -> u32 {
        (self.0 >> MPLS_LABEL_SHIFT) & MPLS_LABEL_MASK
    }

    #[inline]
    pub const fn tc(&self) -> u32 {
        (self.0 >> MPLS_TC_SHIFT) & MPLS_TC_MASK
    }

    #[inline]
    pub const fn eos(&self) -> u32 {
        (self.0 >> MPLS_EOS_SHIFT) & MPLS_EOS_MASK
    }

    #[inline]
    pub const fn ttl(&self) -> u32 {
        (self.0 >> MPLS_TTL_SHIFT) & MPLS_TTL_MASK
    }

    #[inline]
    pub fn set_label(&mut self, value: u32) {
        self.set_field(MPLS_LABEL_SHIFT, MPLS_LABEL_MASK, value);
    }

    #[inline]
    pub fn set_tc(&mut self, value: u32) {
        self.set_field(MPLS_TC_SHIFT, MPLS_TC_MASK, value);
    }

    #[inline]
    pub fn set_eos(&mut self, value: u32) {
        self.set_field(MPLS_EOS_SHIFT, MPLS_EOS_MASK, value);
    }

    #[inline]
    pub fn set_ttl(&mut self, value: u32) {
        self.set_field(MPLS_TTL_SHIFT, MPLS_TTL_MASK, value);
    }

    #[inline]
    fn set_field(&mut self, shift: u32, mask: u32, value: u32) {
        self.0 = (self.0 & !(mask << shift)) | ((value & mask) << shift);
    }
}

impl From<u32> for MplsHeader {
    #[inline]
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<MplsHeader> for u32 {
    #[inline]
    fn from(hdr: MplsHeader) -> u32 {
        hdr.0
    }
}

/// A read-only view of the label stack entry at the front of a buffer.
#[derive(Debug, Clone, Copy)]
pub struct MplsPacket<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> MplsPacket<T> {
    /// Wrap `buf`, handing it back if it cannot hold a full label entry.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() < MPLS_HEADER_LEN {
            return Err(buf);
        }
        Ok(Self { buf })
    }

    #[inline]
    pub fn buf(&self) -> &T {
        &self.buf
    }

    #[inline]
    pub fn release(self) -> T {
        self.buf
    }

    /// The decoded label stack entry.
    #[inline]
    pub fn header(&self) -> MplsHeader {
        MplsHeader(NetworkEndian::read_u32(&self.buf.as_ref()[..MPLS_HEADER_LEN]))
    }

    #[inline]
    pub fn label(&self) -> u32 {
        self.header().label()
    }

    #[inline]
    pub fn ttl(&self) -> u32 {
        self.header().ttl()
    }

    /// The bytes that follow the label entry.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[MPLS_HEADER_LEN..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_layout() {
        let hdr = MplsHeader::new(0xabcde, 5, 1, 0x7f);
        assert_eq!(hdr.raw(), (0xabcde << 12) | (5 << 9) | (1 << 8) | 0x7f);
        assert_eq!(hdr.to_be_bytes(), [0xab, 0xcd, 0xeb, 0x7f]);

        assert_eq!(hdr.label(), 0xabcde);
        assert_eq!(hdr.tc(), 5);
        assert_eq!(hdr.eos(), 1);
        assert_eq!(hdr.ttl(), 0x7f);
    }

    #[test]
    fn setters_mask_input() {
        let mut hdr = MplsHeader::default();
        hdr.set_label(0x1f_ffff);
        assert_eq!(hdr.label(), 0xf_ffff);
        assert_eq!(hdr.raw() & 0xfff, 0);

        hdr.set_tc(0xf);
        assert_eq!(hdr.tc(), 0x7);
        hdr.set_eos(2);
        assert_eq!(hdr.eos(), 0);
        hdr.set_ttl(0x1ff);
        assert_eq!(hdr.ttl(), 0xff);
        assert_eq!(hdr.label(), 0xf_ffff);
    }

    #[test]
    fn setters_leave_other_fields() {
        let all_ones = MplsHeader::from_raw(u32::MAX);

        let mut hdr = all_ones;
        hdr.set_label(0);
        assert_eq!(hdr.raw(), 0x0000_0fff);

        let mut hdr = all_ones;
        hdr.set_tc(0);
        assert_eq!(hdr.raw(), !(0x7 << 9));

        let mut hdr = all_ones;
        hdr.set_eos(0);
        assert_eq!(hdr.raw(), !(0x1 << 8));

        let mut hdr = all_ones;
        hdr.set_ttl(0);
        assert_eq!(hdr.raw(), 0xffff_ff00);
    }

    #[test]
    fn round_trip_fields() {
        let labels = [0, 1, 3, 16, 0x7_ffff, 0xf_fffe, MPLS_LABEL_MASK];
        let ttls = [0, 1, 64, 128, 255];
        for &label in labels.iter() {
            for tc in 0..=7 {
                for eos in 0..=1 {
                    for &ttl in ttls.iter() {
                        let hdr = MplsHeader::new(label, tc, eos, ttl);
                        assert_eq!(hdr.label(), label);
                        assert_eq!(hdr.tc(), tc);
                        assert_eq!(hdr.eos(), eos);
                        assert_eq!(hdr.ttl(), ttl);
                        assert_eq!(MplsHeader::from_be_bytes(hdr.to_be_bytes()), hdr);
                    }
                }
            }
        }
    }

    #[test]
    fn bottom_of_stack_entry() {
        let hdr = MplsHeader::bottom_of_stack(16, 64);
        assert_eq!(hdr.to_be_bytes(), [0x00, 0x01, 0x01, 0x40]);
        assert_eq!(hdr.tc(), 0);
        assert_eq!(hdr.eos(), 1);
    }

    #[test]
    fn packet_view() {
        let bytes = [0x00, 0x01, 0x01, 0x40, 0x45, 0x00];
        let pkt = MplsPacket::parse(&bytes[..]).unwrap();
        assert_eq!(pkt.label(), 16);
        assert_eq!(pkt.ttl(), 64);
        assert_eq!(pkt.header().eos(), 1);
        assert_eq!(pkt.payload(), &[0x45, 0x00]);

        let mut written = [0u8; 4];
        pkt.header().write_to(&mut written[..]);
        assert_eq!(written, [0x00, 0x01, 0x01, 0x40]);

        assert!(MplsPacket::parse(&bytes[..3]).is_err());
    }
}
