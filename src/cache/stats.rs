//! Per-process cache instrumentation

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// One event per `fetch` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Hit,
    Miss,
    Stale,
    Revalidated,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Hit => "hit",
            Event::Miss => "miss",
            Event::Stale => "stale",
            Event::Revalidated => "revalidated",
        }
    }
}

/// Monotonic counters; cheap to bump from any thread
#[derive(Debug, Default)]
pub struct Stats {
    hit: AtomicU64,
    miss: AtomicU64,
    stale: AtomicU64,
    revalidated: AtomicU64,
    unwritable: AtomicU64,
    uncompilable: AtomicU64,
    corrupt: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hit: u64,
    pub miss: u64,
    pub stale: u64,
    pub revalidated: u64,
    pub unwritable: u64,
    pub uncompilable: u64,
    pub corrupt: u64,
}

impl Stats {
    pub fn record(&self, event: Event) {
        let counter = match event {
            Event::Hit => &self.hit,
            Event::Miss => &self.miss,
            Event::Stale => &self.stale,
            Event::Revalidated => &self.revalidated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unwritable(&self) {
        self.unwritable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uncompilable(&self) {
        self.uncompilable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn corrupt(&self) {
        self.corrupt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            revalidated: self.revalidated.load(Ordering::Relaxed),
            unwritable: self.unwritable.load(Ordering::Relaxed),
            uncompilable: self.uncompilable.load(Ordering::Relaxed),
            corrupt: self.corrupt.load(Ordering::Relaxed),
        }
    }
}
