//! Ethernet II header access.
//!
//! Only the parts of the header the forwarder touches are exposed: the two
//! addresses as raw octets and the ethertype. VLAN tags are not recognized, so
//! the ethertype is always read at offset 12.

use byteorder::{ByteOrder, NetworkEndian};

enum_sim! {
    /// An enum-like type for representing Ethertype in Ethernet frame.
    pub struct EtherType (u16) {
        /// Frame payload is Arp protocol.
        ARP =  0x0806,
        /// Frame payload is Ipv4 protocol.
        IPV4 = 0x0800,
        /// Frame payload is Ipv6 protocol.
        IPV6 = 0x86DD,
        /// Frame payload starts with an MPLS unicast label stack entry.
        MPLS = 0x8847,
        /// Frame payload starts with an MPLS multicast label stack entry.
        MPLS_MULTICAST = 0x8848,
    }
}

impl EtherType {
    /// Whether the ethertype announces an MPLS unicast payload.
    ///
    /// Multicast MPLS is not handled by the forwarder and yields `false`.
    #[inline]
    pub fn is_mpls(&self) -> bool {
        *self == Self::MPLS
    }
}

/// Fixed byte length of the Ethernet II header.
pub const ETHER_HEADER_LEN: usize = 14;

/// Minimum Ethernet frame length, CRC included.
pub const ETHER_MIN_LEN: usize = 64;

/// Offset of the ethertype field inside the header.
pub const ETHER_TYPE_OFFSET: usize = 12;

/// A fixed Ether header with an IPv4 ethertype and zeroed addresses.
pub const ETHER_HEADER_TEMPLATE: [u8; ETHER_HEADER_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00,
];

/// A view of the Ethernet II header at the front of a buffer.
#[derive(Debug, Clone, Copy)]
pub struct EtherHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> EtherHeader<T> {
    /// Wrap `buf` without checking its length.
    ///
    /// Accessors panic if `buf` is shorter than [`ETHER_HEADER_LEN`].
    #[inline]
    pub fn parse_unchecked(buf: T) -> Self {
        Self { buf }
    }

    /// Wrap `buf`, handing it back if it cannot hold a full header.
    #[inline]
    pub fn parse(buf: T) -> Result<Self, T> {
        if buf.as_ref().len() < ETHER_HEADER_LEN {
            return Err(buf);
        }
        Ok(Self { buf })
    }

    /// The wrapped buffer.
    #[inline]
    pub fn buf(&self) -> &T {
        &self.buf
    }

    /// Release the wrapped buffer.
    #[inline]
    pub fn release(self) -> T {
        self.buf
    }

    /// The header bytes.
    #[inline]
    pub fn header_slice(&self) -> &[u8] {
        &self.buf.as_ref()[0..ETHER_HEADER_LEN]
    }

    /// The bytes that follow the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[ETHER_HEADER_LEN..]
    }

    /// Destination address octets.
    #[inline]
    pub fn dst_addr(&self) -> [u8; 6] {
        let mut addr = [0; 6];
        addr.copy_from_slice(&self.buf.as_ref()[0..6]);
        addr
    }

    /// Source address octets.
    #[inline]
    pub fn src_addr(&self) -> [u8; 6] {
        let mut addr = [0; 6];
        addr.copy_from_slice(&self.buf.as_ref()[6..12]);
        addr
    }

    /// The ethertype, decoded from network byte order.
    #[inline]
    pub fn ethertype(&self) -> EtherType {
        EtherType::from(NetworkEndian::read_u16(
            &self.buf.as_ref()[ETHER_TYPE_OFFSET..ETHER_HEADER_LEN],
        ))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EtherHeader<T> {
    /// The header bytes, mutably.
    #[inline]
    pub fn header_slice_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut()[0..ETHER_HEADER_LEN]
    }

    /// Set the destination address.
    #[inline]
    pub fn set_dst_addr(&mut self, value: [u8; 6]) {
        self.buf.as_mut()[0..6].copy_from_slice(&value[..]);
    }

    /// Set the source address.
    #[inline]
    pub fn set_src_addr(&mut self, value: [u8; 6]) {
        self.buf.as_mut()[6..12].copy_from_slice(&value[..]);
    }

    /// Set the ethertype, written in network byte order.
    #[inline]
    pub fn set_ethertype(&mut self, value: EtherType) {
        NetworkEndian::write_u16(
            &mut self.buf.as_mut()[ETHER_TYPE_OFFSET..ETHER_HEADER_LEN],
            u16::from(value),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FRAME_BYTES: [u8; 64] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x08, 0x00, 0x45,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0xff,
    ];

    #[test]
    fn header_parse() {
        let eth = EtherHeader::parse(&FRAME_BYTES[..]).unwrap();
        assert_eq!(eth.dst_addr(), [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(eth.src_addr(), [0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);
        assert_eq!(eth.ethertype(), EtherType::IPV4);
        assert_eq!(eth.payload(), &FRAME_BYTES[ETHER_HEADER_LEN..]);

        assert!(EtherHeader::parse(&FRAME_BYTES[..13]).is_err());
    }

    #[test]
    fn header_build() {
        let mut bytes = [0xff; 64];
        bytes[ETHER_HEADER_LEN..].copy_from_slice(&FRAME_BYTES[ETHER_HEADER_LEN..]);
        bytes[..ETHER_HEADER_LEN].copy_from_slice(&ETHER_HEADER_TEMPLATE[..]);

        let mut eth = EtherHeader::parse_unchecked(&mut bytes[..]);
        eth.set_dst_addr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        eth.set_src_addr([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]);
        assert_eq!(eth.ethertype(), EtherType::IPV4);

        assert_eq!(&bytes[..], &FRAME_BYTES[..]);
    }

    #[test]
    fn mpls_ethertype() {
        let mut bytes = FRAME_BYTES;
        let mut eth = EtherHeader::parse_unchecked(&mut bytes[..]);
        eth.set_ethertype(EtherType::MPLS);
        assert!(eth.ethertype().is_mpls());
        assert_eq!(&bytes[12..14], &[0x88, 0x47]);
        assert!(!EtherType::MPLS_MULTICAST.is_mpls());
        assert!(!EtherType::IPV6.is_mpls());
    }
}
