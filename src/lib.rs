//! Live per-interface network monitor: samples kernel counters once per
//! second, converts them to per-interval deltas and keeps a bounded rolling
//! history per interface for the terminal UI.

pub mod source;
pub mod stats;
pub mod ui;
