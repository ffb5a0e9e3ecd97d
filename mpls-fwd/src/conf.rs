use mpls_pkt::mpls::{MPLS_LABEL_MASK, MPLS_TTL_MASK};

use crate::corelist::CoreSet;
use crate::error::*;

/// Startup configuration of the forwarder.
///
/// An empty `cores` set means the forwarder runs on the main lcore only.
#[derive(Clone, Debug)]
pub struct FwdConfig {
    pub mpls_label: u32,
    pub mpls_ttl: u8,
    pub ingress_port: Option<u16>,
    pub verbose: bool,
    pub cores: CoreSet,
}

impl FwdConfig {
    pub const MPLS_DEFAULT_LABEL: u32 = 16;
    pub const MPLS_DEFAULT_TTL: u8 = 64;

    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Fails with `ConfigError` if `val` does not fit the 20-bit label field.
    pub fn set_mpls_label(&mut self, val: u32) -> Result<()> {
        if val & !MPLS_LABEL_MASK != 0 {
            return Error::config_err(format!(
                "mpls label {} exceeds the maximum {}",
                val, MPLS_LABEL_MASK
            ))
            .to_err();
        }
        self.mpls_label = val;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails with `ConfigError` if `val` does not fit the 8-bit ttl field.
    pub fn set_mpls_ttl(&mut self, val: u32) -> Result<()> {
        if val & !MPLS_TTL_MASK != 0 {
            return Error::config_err(format!(
                "mpls ttl {} exceeds the maximum {}",
                val, MPLS_TTL_MASK
            ))
            .to_err();
        }
        self.mpls_ttl = val as u8;
        Ok(())
    }

    pub fn set_ingress_port(&mut self, val: u16) {
        self.ingress_port = Some(val);
    }

    pub fn set_verbose(&mut self, val: bool) {
        self.verbose = val;
    }

    /// Replace the core set with the cores named by `list`, e.g. `"1,3-5"`.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError` if the list is malformed. The current set is
    /// kept in that case.
    pub fn set_core_list(&mut self, list: &str) -> Result<()> {
        self.cores = CoreSet::parse(list)?;
        Ok(())
    }

    pub fn set_cores(&mut self, val: CoreSet) {
        self.cores = val;
    }

    /// Check the fields a caller may have written directly.
    pub fn validate(&self) -> Result<()> {
        if self.mpls_label & !MPLS_LABEL_MASK != 0 {
            return Error::config_err(format!("invalid mpls label {}", self.mpls_label)).to_err();
        }
        Ok(())
    }

    /// The cores streams will run on: the configured set, or `main_lcore`
    /// alone if none was configured.
    pub fn effective_cores(&self, main_lcore: u32) -> CoreSet {
        if self.cores.is_empty() {
            CoreSet::single(main_lcore)
        } else {
            self.cores.clone()
        }
    }
}

impl Default for FwdConfig {
    fn default() -> Self {
        Self {
            mpls_label: Self::MPLS_DEFAULT_LABEL,
            mpls_ttl: Self::MPLS_DEFAULT_TTL,
            ingress_port: None,
            verbose: false,
            cores: CoreSet::new(),
        }
    }
}
