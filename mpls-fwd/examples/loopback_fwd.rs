//! Run the forwarder between two in-memory ports.
//!
//! A wire thread plays both link partners: it feeds ipv4 frames into the
//! ingress port, loops every labeled frame leaving the egress port straight
//! back into it, and counts the frames that come out of the ingress port with
//! their label removed.
//!
//! Usage:
//!   cargo run --example loopback_fwd -- --core-list 0-1 --mpls-label 100 --gabby
//!   RUST_LOG=debug cargo run --example loopback_fwd -- --packets 100000

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use smoltcp::wire;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mpls_fwd::error::Result;
use mpls_fwd::*;

const FRAME_LEN: usize = 128;

#[derive(Parser, Debug)]
#[command(name = "loopback_fwd")]
#[command(about = "Bidirectional ethernet to mpls forwarding over in-memory ports")]
struct Args {
    /// Cores for packet stream processing, e.g. "1,3-5". Defaults to the
    /// first detected core.
    #[arg(long)]
    core_list: Option<String>,

    /// MPLS label value.
    #[arg(long, default_value_t = FwdConfig::MPLS_DEFAULT_LABEL)]
    mpls_label: u32,

    /// TTL value, at most 255.
    #[arg(long, default_value_t = u32::from(FwdConfig::MPLS_DEFAULT_TTL))]
    mpls_ttl: u32,

    /// Port that receives the unlabeled traffic.
    #[arg(long)]
    mpls_on_port: Option<u16>,

    /// Print additional information at startup.
    #[arg(long)]
    gabby: bool,

    /// Stop after this many frames made the round trip, 0 runs until Ctrl+C.
    #[arg(long, default_value_t = 0)]
    packets: u64,
}

fn ipv4_frame(ident: u16) -> Vec<u8> {
    let mut bytes = vec![0u8; FRAME_LEN];

    let mut eth = wire::EthernetFrame::new_unchecked(&mut bytes[..]);
    eth.set_dst_addr(wire::EthernetAddress([0x08, 0x68, 0x8d, 0x61, 0x69, 0x28]));
    eth.set_src_addr(wire::EthernetAddress([0x08, 0x68, 0x8d, 0x61, 0x69, 0x29]));
    eth.set_ethertype(wire::EthernetProtocol::Ipv4);

    let mut ip = wire::Ipv4Packet::new_unchecked(eth.payload_mut());
    ip.set_version(4);
    ip.set_header_len(20);
    ip.set_total_len((FRAME_LEN - 14) as u16);
    ip.set_ident(ident);
    ip.set_hop_limit(64);
    ip.set_protocol(wire::IpProtocol::Udp);
    ip.set_src_addr(wire::Ipv4Address([192, 168, 22, 1]));
    ip.set_dst_addr(wire::Ipv4Address([192, 168, 22, 2]));
    ip.fill_checksum();

    bytes
}

// Drive both ends of the wire until `stop` is raised.
fn run_wire(
    ingress: &RingPort<HeapMbuf>,
    egress: &RingPort<HeapMbuf>,
    mp: &Mempool,
    stop: &AtomicBool,
    round_trips: &AtomicU64,
    limit: u64,
) {
    let mut ident: u16 = 0;
    while !stop.load(Ordering::Acquire) {
        for qid in 0..ingress.nb_queues() {
            while let Some(mbuf) = mp.alloc_frame(&ipv4_frame(ident)) {
                if ingress.inject(qid, mbuf).is_err() {
                    break;
                }
                ident = ident.wrapping_add(1);
            }

            for mbuf in egress.drain(qid) {
                // a full ring drops the frame, like a real link would
                let _ = egress.inject(qid, mbuf);
            }

            let nb = ingress.drain(qid).len() as u64;
            let total = round_trips.fetch_add(nb, Ordering::Relaxed) + nb;
            if limit > 0 && total >= limit {
                stop.store(true, Ordering::Release);
            }
        }
        std::thread::yield_now();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut conf = FwdConfig::new();
    conf.set_mpls_label(args.mpls_label)?;
    conf.set_mpls_ttl(args.mpls_ttl)?;
    conf.set_verbose(args.gabby);
    if let Some(port_id) = args.mpls_on_port {
        conf.set_ingress_port(port_id);
    }
    if let Some(list) = args.core_list.as_deref() {
        conf.set_core_list(list)?;
    }
    conf.validate()?;

    let lcores = detect_lcores();
    let main_lcore = lcores.first().map_or(0, |lcore| lcore.lcore_id);
    let mut cores = conf.effective_cores(main_lcore);
    if lcores.is_empty() {
        warn!("no lcore detected under sysfs, using the core list as is");
    } else {
        let detected: Vec<u32> = lcores.iter().map(|lcore| lcore.lcore_id).collect();
        cores.retain_detected(&detected)?;
    }
    if conf.verbose {
        info!(
            nb_lcores = lcores.len(),
            nb_cores = cores.len(),
            "execution units"
        );
        for lcore in lcores.iter().filter(|lcore| cores.contains(lcore.lcore_id)) {
            info!(lcore = lcore.lcore_id, socket = lcore.socket_id, "processing core");
        }
    }

    let roles = select_ports(&[0, 1], conf.ingress_port)?;
    let mut ring_conf = RingConf::new();
    ring_conf.set_nb_queues(cores.len() as u16);
    let ports = [RingPort::new(0, &ring_conf)?, RingPort::new(1, &ring_conf)?];
    let ingress = &ports[usize::from(roles.ingress)];
    let egress = &ports[usize::from(roles.egress)];

    let mp = Mempool::try_create(&MempoolConf::default())?;

    let workers = assign_streams(&cores, roles, conf.mpls_label, conf.mpls_ttl, conf.verbose)
        .into_iter()
        .map(|stream| FwdWorker::new(stream, ingress, egress))
        .collect::<Result<Vec<_>>>()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "fail to set the Ctrl+C handler");
    }

    let round_trips = AtomicU64::new(0);
    let start = Instant::now();
    let stats = std::thread::scope(|s| {
        s.spawn(|| run_wire(ingress, egress, &mp, &stop, &round_trips, args.packets));
        launch(workers, &stop)
    })?;
    let elapsed = start.elapsed().max(Duration::from_millis(1));

    for (i, st) in stats.iter().enumerate() {
        println!(
            "stream {}: encap rx {} tx {} dropped {} tx-dropped {}, decap rx {} tx {} passed {} tx-dropped {}",
            i,
            st.encap.rx_pkts,
            st.encap.tx_pkts,
            st.encap.dropped,
            st.encap.tx_dropped,
            st.decap.rx_pkts,
            st.decap.tx_pkts,
            st.decap.passed,
            st.decap.tx_dropped
        );
    }
    let total = round_trips.load(Ordering::Relaxed);
    println!(
        "{} round trips in {:?}, {:.3} Mpps",
        total,
        elapsed,
        total as f64 / elapsed.as_secs_f64() / 1e6
    );

    Ok(())
}
