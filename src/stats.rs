//! Stats-delta engine: turns cumulative kernel counters into per-tick deltas
//! and keeps a bounded rolling history of those deltas per interface.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::source::CounterSource;

/// Number of delta points retained per metric field.
pub const SERIES_LEN: usize = 300;

/// One reading of the eight per-interface counters. Used both for absolute
/// kernel values and for per-interval deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
}

impl Counters {
    /// Field-wise `self - prev` with modulo 2^64 semantics.
    ///
    /// A counter that legitimately wrapped past u64::MAX yields the correct
    /// wrapped delta. A counter that went backwards because the interface was
    /// reset or replaced yields a huge spurious delta instead; the two cases
    /// are indistinguishable here and the spike is a known limitation.
    pub fn wrapping_delta(&self, prev: &Counters) -> Counters {
        Counters {
            rx_packets: self.rx_packets.wrapping_sub(prev.rx_packets),
            rx_bytes: self.rx_bytes.wrapping_sub(prev.rx_bytes),
            rx_errors: self.rx_errors.wrapping_sub(prev.rx_errors),
            rx_dropped: self.rx_dropped.wrapping_sub(prev.rx_dropped),
            tx_packets: self.tx_packets.wrapping_sub(prev.tx_packets),
            tx_bytes: self.tx_bytes.wrapping_sub(prev.tx_bytes),
            tx_errors: self.tx_errors.wrapping_sub(prev.tx_errors),
            tx_dropped: self.tx_dropped.wrapping_sub(prev.tx_dropped),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("interface {0} is unknown or its counters are unreadable")]
    SourceUnavailable(String),
}

/// Remembers the last absolute reading per interface and converts each new
/// reading into a delta since the previous one.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last_seen: HashMap<String, Counters>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `abs` as the new baseline for `name` and returns the delta
    /// against the previous baseline. The first reading for a name has no
    /// baseline and anchors at zero rather than guessing a rate.
    pub fn record(&mut self, name: &str, abs: Counters) -> Counters {
        match self.last_seen.insert(name.to_string(), abs) {
            Some(prev) => abs.wrapping_delta(&prev),
            None => Counters::default(),
        }
    }

    /// Drops every stored baseline; the next reading per interface behaves
    /// like a first sample again.
    pub fn reset(&mut self) {
        self.last_seen.clear();
    }
}

/// Rolling history of one interface: eight queues, each exactly
/// [`SERIES_LEN`] long, newest value at index 0, index-aligned in time.
#[derive(Debug, Clone)]
struct SeriesBuffer {
    rx_packets: VecDeque<f64>,
    rx_bytes: VecDeque<f64>,
    rx_errors: VecDeque<f64>,
    rx_dropped: VecDeque<f64>,
    tx_packets: VecDeque<f64>,
    tx_bytes: VecDeque<f64>,
    tx_errors: VecDeque<f64>,
    tx_dropped: VecDeque<f64>,
}

impl SeriesBuffer {
    fn zeroed() -> Self {
        let zeros = || VecDeque::from(vec![0.0; SERIES_LEN]);
        Self {
            rx_packets: zeros(),
            rx_bytes: zeros(),
            rx_errors: zeros(),
            rx_dropped: zeros(),
            tx_packets: zeros(),
            tx_bytes: zeros(),
            tx_errors: zeros(),
            tx_dropped: zeros(),
        }
    }

    // Prepend-and-evict, O(1) per field. Length stays SERIES_LEN by
    // construction; all eight fields advance under the same &mut self.
    fn push(&mut self, delta: &Counters) {
        fn roll(q: &mut VecDeque<f64>, v: u64) {
            q.push_front(v as f64);
            q.pop_back();
        }
        roll(&mut self.rx_packets, delta.rx_packets);
        roll(&mut self.rx_bytes, delta.rx_bytes);
        roll(&mut self.rx_errors, delta.rx_errors);
        roll(&mut self.rx_dropped, delta.rx_dropped);
        roll(&mut self.tx_packets, delta.tx_packets);
        roll(&mut self.tx_bytes, delta.tx_bytes);
        roll(&mut self.tx_errors, delta.tx_errors);
        roll(&mut self.tx_dropped, delta.tx_dropped);
    }

    fn view(&self) -> SeriesView {
        SeriesView {
            rx_packets: self.rx_packets.iter().copied().collect(),
            rx_bytes: self.rx_bytes.iter().copied().collect(),
            rx_errors: self.rx_errors.iter().copied().collect(),
            rx_dropped: self.rx_dropped.iter().copied().collect(),
            tx_packets: self.tx_packets.iter().copied().collect(),
            tx_bytes: self.tx_bytes.iter().copied().collect(),
            tx_errors: self.tx_errors.iter().copied().collect(),
            tx_dropped: self.tx_dropped.iter().copied().collect(),
        }
    }
}

/// Owned, immutable copy of one interface's history handed to the renderer.
/// Each sequence is [`SERIES_LEN`] floats, newest-first; later appends to the
/// store never mutate a view that was already returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesView {
    pub rx_packets: Vec<f64>,
    pub rx_bytes: Vec<f64>,
    pub rx_errors: Vec<f64>,
    pub rx_dropped: Vec<f64>,
    pub tx_packets: Vec<f64>,
    pub tx_bytes: Vec<f64>,
    pub tx_errors: Vec<f64>,
    pub tx_dropped: Vec<f64>,
}

impl SeriesView {
    fn zeroed() -> Self {
        SeriesBuffer::zeroed().view()
    }
}

/// Fixed-capacity per-interface delta history.
#[derive(Debug, Default)]
pub struct RollingSeriesStore {
    buffers: HashMap<String, SeriesBuffer>,
}

impl RollingSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one delta for `name`. The first append allocates an all-zero
    /// buffer before the new values go in, so a freshly tracked interface
    /// charts as a flat line rather than an empty one.
    pub fn append(&mut self, name: &str, delta: &Counters) {
        self.buffers
            .entry(name.to_string())
            .or_insert_with(SeriesBuffer::zeroed)
            .push(delta);
    }

    /// Current history for `name`, or an all-zero view if the interface has
    /// never been appended.
    pub fn read(&self, name: &str) -> SeriesView {
        self.buffers
            .get(name)
            .map(SeriesBuffer::view)
            .unwrap_or_else(SeriesView::zeroed)
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
    }
}

/// Per-tick snapshot for one interface: the delta over the last interval and
/// a read-only copy of its history. Recomputed every tick, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceStats {
    pub name: String,
    pub delta: Counters,
    pub series: SeriesView,
}

impl InterfaceStats {
    /// Fixed-width table of the latest per-second deltas, ready for direct
    /// display.
    pub fn render_table(&self) -> String {
        let d = &self.delta;
        let mut out = String::new();
        out.push_str(&format!(" Name: {:>32}\n", self.name));
        out.push_str("----------+-TX-----------+-RX----------\n");
        out.push_str(&format!(" Packets: | {:>12} | {:>12}\n", d.tx_packets, d.rx_packets));
        out.push_str(&format!(" Bytes:   | {:>12} | {:>12}\n", d.tx_bytes, d.rx_bytes));
        out.push_str(&format!(" Dropped: | {:>12} | {:>12}\n", d.tx_dropped, d.rx_dropped));
        out.push_str(&format!(" Error:   | {:>12} | {:>12}\n", d.tx_errors, d.rx_errors));
        out
    }
}

/// Drives one sampling pass: counter source -> delta tracker -> series store.
///
/// Owns all mutable state, so wrapping one engine in a mutex is enough to
/// serialize the sampler tick against a reset issued from another thread.
pub struct StatsEngine<S: CounterSource> {
    source: S,
    tracker: DeltaTracker,
    series: RollingSeriesStore,
}

impl<S: CounterSource> StatsEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            tracker: DeltaTracker::new(),
            series: RollingSeriesStore::new(),
        }
    }

    /// Samples one interface and returns its snapshot.
    ///
    /// If the source cannot read the interface, no tracker or series state
    /// changes and the caller is expected to retry on a later tick.
    pub fn sample(&mut self, name: &str) -> Result<InterfaceStats, SampleError> {
        self.source.refresh();
        self.sample_refreshed(name)
    }

    // Sampling step against the source's current snapshot; refresh happens
    // once per pass, not once per interface.
    fn sample_refreshed(&mut self, name: &str) -> Result<InterfaceStats, SampleError> {
        let abs = self
            .source
            .counters(name)
            .ok_or_else(|| SampleError::SourceUnavailable(name.to_string()))?;
        let delta = self.tracker.record(name, abs);
        self.series.append(name, &delta);
        Ok(InterfaceStats {
            name: name.to_string(),
            delta,
            series: self.series.read(name),
        })
    }

    /// One tick: samples every configured interface in the configured order.
    /// A failed interface is skipped this tick and retried on the next; a
    /// failure is never fatal to the loop.
    pub fn sample_all(&mut self, names: &[String]) -> Vec<InterfaceStats> {
        self.source.refresh();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            match self.sample_refreshed(name) {
                Ok(stats) => out.push(stats),
                Err(err) => log::debug!("skipping {name} this tick: {err}"),
            }
        }
        out
    }

    /// Clears baselines and history together. Both maps are wiped under the
    /// same `&mut self`, so a tracker delta and a series buffer can never
    /// disagree about whether history was erased.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.series.reset();
    }
}

/// Merges one tick's successful snapshots over the previously published set,
/// in configured order.
///
/// A fresh snapshot replaces the previous one for its interface; an interface
/// whose read failed this tick keeps its previous snapshot, so its table and
/// graph stay on screen unchanged instead of vanishing. An interface that has
/// never been sampled successfully stays absent.
pub fn merge_snapshots(
    names: &[String],
    previous: &[InterfaceStats],
    fresh: Vec<InterfaceStats>,
) -> Vec<InterfaceStats> {
    let mut fresh: HashMap<String, InterfaceStats> =
        fresh.into_iter().map(|s| (s.name.clone(), s)).collect();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        if let Some(stats) = fresh.remove(name) {
            out.push(stats);
        } else if let Some(stats) = previous.iter().find(|s| &s.name == name) {
            out.push(stats.clone());
        }
    }
    out
}
