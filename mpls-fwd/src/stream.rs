use mpls_pkt::mpls::MplsHeader;

use crate::corelist::CoreSet;
use crate::error::*;

/// Number of ports a forwarder runs between.
pub const NB_FWD_PORTS: usize = 2;

/// The queue pair a stream uses on one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamPort {
    pub port_id: u16,
    pub rx_queue_id: u16,
    pub tx_queue_id: u16,
}

/// Everything one forwarding worker needs to know, fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FwdStream {
    pub lcore_id: u32,
    pub ingress: StreamPort,
    pub egress: StreamPort,
    pub mpls_label: u32,
    pub mpls_ttl: u8,
    pub verbose: bool,
}

impl FwdStream {
    /// The single-entry label stack pushed onto every encapsulated frame.
    pub fn mpls_header(&self) -> MplsHeader {
        MplsHeader::bottom_of_stack(self.mpls_label, u32::from(self.mpls_ttl))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortRoles {
    pub ingress: u16,
    pub egress: u16,
}

/// Pick the ingress and egress port out of the available ones.
///
/// Exactly two ports must be available. `preferred_ingress` takes the ingress
/// role when given; otherwise the first port is ingress and the second egress.
pub fn select_ports(available: &[u16], preferred_ingress: Option<u16>) -> Result<PortRoles> {
    if available.len() != NB_FWD_PORTS {
        return Error::config_err(format!(
            "{} ports are available, exactly {} are required",
            available.len(),
            NB_FWD_PORTS
        ))
        .to_err();
    }
    if available[0] == available[1] {
        return Error::config_err(format!("port {} is listed twice", available[0])).to_err();
    }

    let ingress = match preferred_ingress {
        Some(port_id) if available.contains(&port_id) => port_id,
        Some(port_id) => {
            return Error::config_err(format!("ingress port {} is not available", port_id)).to_err()
        }
        None => available[0],
    };
    let egress = if available[0] == ingress {
        available[1]
    } else {
        available[0]
    };

    Ok(PortRoles { ingress, egress })
}

/// Build one stream per core. Stream `i` runs on the `i`-th core and owns
/// queue `i`, for both rx and tx, on both ports.
pub fn assign_streams(
    cores: &CoreSet,
    roles: PortRoles,
    mpls_label: u32,
    mpls_ttl: u8,
    verbose: bool,
) -> Vec<FwdStream> {
    cores
        .iter()
        .enumerate()
        .map(|(qid, lcore_id)| {
            let qid = qid as u16;
            FwdStream {
                lcore_id,
                ingress: StreamPort {
                    port_id: roles.ingress,
                    rx_queue_id: qid,
                    tx_queue_id: qid,
                },
                egress: StreamPort {
                    port_id: roles.egress,
                    rx_queue_id: qid,
                    tx_queue_id: qid,
                },
                mpls_label,
                mpls_ttl,
                verbose,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_roles() {
        assert_eq!(
            select_ports(&[0, 1], None).unwrap(),
            PortRoles {
                ingress: 0,
                egress: 1
            }
        );
        assert_eq!(
            select_ports(&[0, 1], Some(1)).unwrap(),
            PortRoles {
                ingress: 1,
                egress: 0
            }
        );

        for (ports, preferred) in [
            (&[0u16][..], None),
            (&[0, 1, 2][..], None),
            (&[3, 3][..], None),
            (&[0, 1][..], Some(2)),
        ] {
            let err = select_ports(ports, preferred).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigError);
        }
    }

    #[test]
    fn stream_per_core() {
        let cores: CoreSet = "2,4-5".parse().unwrap();
        let roles = PortRoles {
            ingress: 1,
            egress: 0,
        };
        let streams = assign_streams(&cores, roles, 100, 32, true);

        assert_eq!(streams.len(), 3);
        for (i, (stream, lcore_id)) in streams.iter().zip([2, 4, 5]).enumerate() {
            assert_eq!(stream.lcore_id, lcore_id);
            assert_eq!(stream.ingress.port_id, 1);
            assert_eq!(stream.egress.port_id, 0);
            assert_eq!(stream.ingress.rx_queue_id, i as u16);
            assert_eq!(stream.ingress.tx_queue_id, i as u16);
            assert_eq!(stream.egress.rx_queue_id, i as u16);
            assert_eq!(stream.egress.tx_queue_id, i as u16);
            assert!(stream.verbose);

            let hdr = stream.mpls_header();
            assert_eq!(hdr.label(), 100);
            assert_eq!(hdr.ttl(), 32);
            assert_eq!(hdr.tc(), 0);
            assert_eq!(hdr.eos(), 1);
        }

        assert!(assign_streams(&CoreSet::new(), roles, 16, 64, false).is_empty());
    }
}
