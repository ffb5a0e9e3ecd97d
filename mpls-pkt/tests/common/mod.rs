use smoltcp::wire::{
    EthernetAddress, EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Packet,
};

pub const DMAC: [u8; 6] = [0x40, 0xa6, 0xb7, 0x60, 0xa2, 0xb1];
pub const SMAC: [u8; 6] = [0x40, 0xa6, 0xb7, 0x60, 0xa5, 0xf8];

// An Ethernet + IPv4 frame of `len` bytes, built with smoltcp.
pub fn ipv4_frame(len: usize) -> Vec<u8> {
    assert!(len >= 14 + 20);
    let mut bytes = vec![0u8; len];

    let mut eth = EthernetFrame::new_unchecked(&mut bytes[..]);
    eth.set_dst_addr(EthernetAddress(DMAC));
    eth.set_src_addr(EthernetAddress(SMAC));
    eth.set_ethertype(EthernetProtocol::Ipv4);

    let mut ip = Ipv4Packet::new_unchecked(eth.payload_mut());
    ip.set_version(4);
    ip.set_header_len(20);
    ip.set_total_len((len - 14) as u16);
    ip.set_hop_limit(64);
    ip.set_protocol(IpProtocol::Udp);
    ip.set_src_addr(Ipv4Address([192, 168, 22, 1]));
    ip.set_dst_addr(Ipv4Address([192, 168, 22, 2]));
    ip.fill_checksum();

    bytes
}
