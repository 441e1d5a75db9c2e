//! Process memory sampling.
//!
//! A native process has no managed heap, so the monitor reports memory in
//! these terms:
//!
//! - `rss`: resident set size of the process
//! - `heap_used`: resident memory (what the process actually occupies)
//! - `heap_total`: the configured memory budget, or total system memory
//! - `external`: virtual memory that is mapped but not resident
//!
//! The sysinfo-backed probe caches its last reading briefly so that a burst
//! of health checks does not hammer `/proc`.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const SAMPLE_CACHE_DURATION: Duration = Duration::from_millis(250);

/// Raw memory reading in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub rss_bytes: u64,
    pub heap_total_bytes: u64,
    pub heap_used_bytes: u64,
    pub external_bytes: u64,
}

/// Memory report in megabytes, rounded to two decimals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss: f64,
    pub heap_total: f64,
    pub heap_used: f64,
    pub external: f64,
    pub heap_used_percentage: f64,
}

impl From<MemorySample> for MemoryUsage {
    fn from(sample: MemorySample) -> Self {
        let percentage = if sample.heap_total_bytes == 0 {
            0.0
        } else {
            sample.heap_used_bytes as f64 / sample.heap_total_bytes as f64 * 100.0
        };

        Self {
            rss: to_mb(sample.rss_bytes),
            heap_total: to_mb(sample.heap_total_bytes),
            heap_used: to_mb(sample.heap_used_bytes),
            external: to_mb(sample.external_bytes),
            heap_used_percentage: round2(percentage),
        }
    }
}

fn to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Source of memory readings
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Reads the current process through sysinfo
pub struct ProcessMemoryProbe {
    pid: Option<Pid>,
    limit_bytes: Option<u64>,
    system: Mutex<System>,
    cached: Mutex<Option<(Instant, MemorySample)>>,
}

impl ProcessMemoryProbe {
    /// `limit_mb` overrides total system memory as the heap budget
    pub fn new(limit_mb: Option<u64>) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Cannot determine current process id, memory stats disabled: {}", e);
                None
            }
        };

        Self {
            pid,
            limit_bytes: limit_mb.map(|mb| mb.saturating_mul(1024 * 1024)),
            system: Mutex::new(System::new()),
            cached: Mutex::new(None),
        }
    }

    fn read(&self) -> MemorySample {
        let mut sys = self.system.lock();

        let (rss, virt) = match self.pid {
            Some(pid) => {
                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_memory(),
                );
                sys.process(pid)
                    .map(|p| (p.memory(), p.virtual_memory()))
                    .unwrap_or((0, 0))
            }
            None => (0, 0),
        };

        let total = match self.limit_bytes {
            Some(limit) => limit,
            None => {
                sys.refresh_memory();
                sys.total_memory()
            }
        };

        MemorySample {
            rss_bytes: rss,
            heap_total_bytes: total,
            heap_used_bytes: rss,
            external_bytes: virt.saturating_sub(rss),
        }
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> MemorySample {
        let now = Instant::now();
        if let Some((at, sample)) = *self.cached.lock() {
            if now.duration_since(at) < SAMPLE_CACHE_DURATION {
                return sample;
            }
        }

        let sample = self.read();
        *self.cached.lock() = Some((now, sample));
        sample
    }
}

/// Probe returning a settable reading
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    sample: Mutex<MemorySample>,
}

impl FixedMemoryProbe {
    pub fn new(sample: MemorySample) -> Self {
        Self {
            sample: Mutex::new(sample),
        }
    }

    /// Probe reporting `used_mb` out of `total_mb`
    pub fn with_usage(used_mb: u64, total_mb: u64) -> Self {
        let mb = 1024 * 1024;
        Self::new(MemorySample {
            rss_bytes: used_mb * mb,
            heap_total_bytes: total_mb * mb,
            heap_used_bytes: used_mb * mb,
            external_bytes: 0,
        })
    }

    pub fn set(&self, sample: MemorySample) {
        *self.sample.lock() = sample;
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> MemorySample {
        *self.sample.lock()
    }
}
