use std::collections::BTreeSet;
use std::str::FromStr;

use tracing::warn;

use crate::error::*;

/// Upper bound on the number of distinct lcores a core list may name.
pub const MAX_LCORE: usize = 128;

/// An ascending, duplicate-free set of lcore ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreSet {
    cores: Vec<u32>,
}

impl CoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(lcore_id: u32) -> Self {
        Self {
            cores: vec![lcore_id],
        }
    }

    /// Parse a core list such as `"1,3-5"`, bounded by [`MAX_LCORE`].
    pub fn parse(list: &str) -> Result<Self> {
        parse_core_list(list, MAX_LCORE)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.cores
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.cores.iter().copied()
    }

    pub fn contains(&self, lcore_id: u32) -> bool {
        self.cores.binary_search(&lcore_id).is_ok()
    }

    /// Keep only the cores present in `detected`, warning about each core that
    /// gets skipped.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError` if no core is left.
    pub fn retain_detected(&mut self, detected: &[u32]) -> Result<()> {
        self.cores.retain(|lcore_id| {
            let found = detected.contains(lcore_id);
            if !found {
                warn!(lcore = *lcore_id, "lcore is not enabled, skipping");
            }
            found
        });

        if self.cores.is_empty() {
            return Error::config_err("none of the listed lcores is enabled").to_err();
        }
        Ok(())
    }
}

impl FromStr for CoreSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse a comma-separated list of lcore ids and inclusive `low-high` ranges.
///
/// Whitespace around each token is ignored and a single trailing comma is
/// accepted. An empty or blank list yields an empty set. Nothing is returned
/// on error: either the whole list is valid or the call fails with
/// `ConfigError`.
pub fn parse_core_list(list: &str, capacity: usize) -> Result<CoreSet> {
    if list.trim().is_empty() {
        return Ok(CoreSet::new());
    }

    let invalid = |reason: &str| Error::config_err(format!("invalid core list '{}': {}", list, reason));

    let tokens: Vec<&str> = list.split(',').map(str::trim).collect();
    let last = tokens.len() - 1;
    let mut cores = BTreeSet::new();

    for (idx, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            if idx == last {
                break;
            }
            return Err(invalid("empty entry"));
        }

        let (low, high) = match token.split_once('-') {
            Some((low, high)) => {
                if high.contains('-') {
                    return Err(invalid("range is opened twice"));
                }
                (parse_lcore_id(low.trim(), list)?, parse_lcore_id(high.trim(), list)?)
            }
            None => {
                let id = parse_lcore_id(token, list)?;
                (id, id)
            }
        };

        if low > high {
            return Err(invalid(&format!("range {}-{} is reversed", low, high)));
        }

        for id in low..=high {
            cores.insert(id);
            if cores.len() > capacity {
                return Err(invalid(&format!("more than {} lcores", capacity)));
            }
        }
    }

    Ok(CoreSet {
        cores: cores.into_iter().collect(),
    })
}

fn parse_lcore_id(s: &str, list: &str) -> Result<u32> {
    if s.is_empty() {
        return Error::config_err(format!("invalid core list '{}': missing lcore id", list)).to_err();
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Error::config_err(format!(
            "invalid core list '{}': unexpected character in '{}'",
            list, s
        ))
        .to_err();
    }
    s.parse::<u32>().map_err(|_| {
        Error::config_err(format!("invalid core list '{}': '{}' is out of range", list, s))
    })
}
