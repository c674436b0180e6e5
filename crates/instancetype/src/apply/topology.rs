//! Guest CPU topology
//!
//! Lays a vCPU count out over sockets, cores and threads according to the
//! preferred topology of a preference.

use crds::{PreferredCpuTopology, SpreadAcross};

/// Threads per core when spreading across all three axes.
const SPREAD_THREADS_PER_CORE: u32 = 2;

/// Sockets, cores per socket and threads per core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTopology {
    pub cores: u32,
    pub sockets: u32,
    pub threads: u32,
}

impl Default for CpuTopology {
    fn default() -> Self {
        Self {
            cores: 1,
            sockets: 1,
            threads: 1,
        }
    }
}

/// Computes the topology for `vcpus`.
///
/// Callers must pass a `vcpus` evenly divisible by the spread ratio (and by
/// two when spreading across three axes); the division truncates otherwise.
/// `ratio` must be non-zero.
#[must_use]
pub fn guest_topology(vcpus: u32, topology: PreferredCpuTopology, ratio: u32, across: SpreadAcross) -> CpuTopology {
    let mut result = CpuTopology::default();
    if vcpus <= 1 {
        return result;
    }

    match topology {
        PreferredCpuTopology::Cores => result.cores = vcpus,
        PreferredCpuTopology::Sockets | PreferredCpuTopology::Any => result.sockets = vcpus,
        PreferredCpuTopology::Threads => result.threads = vcpus,
        PreferredCpuTopology::Spread => match across {
            SpreadAcross::SocketsCores => {
                result.cores = ratio;
                result.sockets = vcpus / ratio;
            }
            SpreadAcross::CoresThreads => {
                result.threads = ratio;
                result.cores = vcpus / ratio;
            }
            SpreadAcross::SocketsCoresThreads => {
                result.threads = SPREAD_THREADS_PER_CORE;
                result.cores = ratio;
                result.sockets = vcpus / SPREAD_THREADS_PER_CORE / ratio;
            }
        },
    }
    result
}
