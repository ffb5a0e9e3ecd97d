#![allow(dead_code)]

use mpls_fwd::{Mempool, MempoolConf};
use smoltcp::wire::{
    EthernetAddress, EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Packet,
    Ipv6Address, Ipv6Packet,
};

pub const DMAC: [u8; 6] = [0x40, 0xa6, 0xb7, 0x60, 0xa2, 0xb1];
pub const SMAC: [u8; 6] = [0x40, 0xa6, 0xb7, 0x60, 0xa5, 0xf8];

pub fn pool(nb_mbufs: u32) -> Mempool {
    let mut conf = MempoolConf::new();
    conf.set_nb_mbufs(nb_mbufs);
    Mempool::try_create(&conf).unwrap()
}

// An Ethernet + IPv4 frame of `len` bytes carrying `ident` in the ip header.
pub fn ipv4_frame(len: usize, ident: u16) -> Vec<u8> {
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
    ip.set_ident(ident);
    ip.set_hop_limit(64);
    ip.set_protocol(IpProtocol::Udp);
    ip.set_src_addr(Ipv4Address([10, 0, 0, 1]));
    ip.set_dst_addr(Ipv4Address([10, 0, 0, 2]));
    ip.fill_checksum();

    bytes
}

// An Ethernet + IPv6 frame of `len` bytes.
pub fn ipv6_frame(len: usize) -> Vec<u8> {
    assert!(len >= 14 + 40);
    let mut bytes = vec![0u8; len];

    let mut eth = EthernetFrame::new_unchecked(&mut bytes[..]);
    eth.set_dst_addr(EthernetAddress(DMAC));
    eth.set_src_addr(EthernetAddress(SMAC));
    eth.set_ethertype(EthernetProtocol::Ipv6);

    let mut ip = Ipv6Packet::new_unchecked(eth.payload_mut());
    ip.set_version(6);
    ip.set_payload_len((len - 14 - 40) as u16);
    ip.set_next_header(IpProtocol::Udp);
    ip.set_hop_limit(64);
    ip.set_src_addr(Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
    ip.set_dst_addr(Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 2));

    bytes
}

pub fn ipv4_ident(frame: &[u8]) -> u16 {
    let eth = EthernetFrame::new_checked(frame).unwrap();
    Ipv4Packet::new_checked(eth.payload()).unwrap().ident()
}
