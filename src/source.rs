//! OS counter source: absolute, cumulative per-interface counters.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::stats::Counters;

/// Opaque provider of absolute kernel counters. `None` means the interface is
/// unknown or its counters cannot currently be read; callers must tolerate
/// that for any name at any time.
pub trait CounterSource {
    /// Called once at the start of each sampling pass. Sources that read a
    /// whole kernel table in one go refresh their snapshot here; the default
    /// is a no-op for sources that answer `counters` directly.
    fn refresh(&mut self) {}

    fn counters(&mut self, name: &str) -> Option<Counters>;
}

/// Reads `/proc/net/dev` once per sampling pass and answers every interface
/// lookup from that snapshot.
pub struct ProcNetDev {
    path: PathBuf,
    snapshot: HashMap<String, Counters>,
}

impl ProcNetDev {
    pub fn new() -> Self {
        Self::with_path("/proc/net/dev")
    }

    fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: HashMap::new(),
        }
    }
}

impl Default for ProcNetDev {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for ProcNetDev {
    fn refresh(&mut self) {
        self.snapshot = match fs::read_to_string(&self.path) {
            Ok(contents) => parse_proc_net_dev(&contents),
            Err(err) => {
                log::debug!("reading {} failed: {err}", self.path.display());
                HashMap::new()
            }
        };
    }

    fn counters(&mut self, name: &str) -> Option<Counters> {
        self.snapshot.get(name).copied()
    }
}

/// Parses `/proc/net/dev` contents into a per-interface counter table.
///
/// After the interface name and colon the columns are:
/// rx bytes packets errs drop fifo frame compressed multicast,
/// tx bytes packets errs drop fifo colls carrier compressed.
/// The name can be glued to the first rx value ("eth0:12345"), so each line is
/// split on the colon rather than on whitespace alone. Malformed lines are
/// skipped.
pub fn parse_proc_net_dev(contents: &str) -> HashMap<String, Counters> {
    let mut table = HashMap::new();
    for line in contents.lines().skip(2) {
        let (iface, rest) = match line.split_once(':') {
            Some((iface, rest)) => (iface.trim(), rest),
            None => continue,
        };
        let fields: Vec<u64> = match rest
            .split_whitespace()
            .map(|f| f.parse::<u64>())
            .collect::<Result<_, _>>()
        {
            Ok(fields) => fields,
            Err(_) => continue,
        };
        if fields.len() < 12 {
            continue;
        }
        table.insert(
            iface.to_string(),
            Counters {
                rx_bytes: fields[0],
                rx_packets: fields[1],
                rx_errors: fields[2],
                rx_dropped: fields[3],
                tx_bytes: fields[8],
                tx_packets: fields[9],
                tx_errors: fields[10],
                tx_dropped: fields[11],
            },
        );
    }
    table
}
