/// System load average collector module.
/// Collects 1, 5, and 15-minute load averages and process counts.
///
/// Available when:
/// - `minimal` or `standard` features are enabled on Linux, OR
/// - `collector-loadavg` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-loadavg", target_os = "linux"))]
pub mod avg;

/// CPU time collector module.
/// Collects per-core time spent in each CPU mode.
///
/// Available when:
/// - `minimal` or `standard` features are enabled on Linux, OR
/// - `collector-cpu` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-cpu", target_os = "linux"))]
pub mod cpu;

/// Entropy pool statistics collector module.
/// Collects available entropy in the kernel's random number generator.
///
/// Available when:
/// - `standard` feature is enabled on Linux, OR
/// - `collector-entropy` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-entropy", target_os = "linux"))]
pub mod entropy;

/// Error types and handling utilities.
/// Common error types used across all collectors.
pub mod error;

/// File descriptor statistics collector module.
/// Tracks allocated file handles and the system-wide limit.
///
/// Available when:
/// - `standard` feature is enabled on Linux, OR
/// - `collector-filefd` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-filefd", target_os = "linux"))]
pub mod filefd;

/// Pressure Stall Information (PSI) collector module.
/// Collects CPU, memory and I/O pressure. Disabled at startup on kernels
/// without PSI.
///
/// Available when:
/// - `standard` feature is enabled on Linux, OR
/// - `collector-pressure` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-pressure", target_os = "linux"))]
pub mod pressure;

/// Memory statistics collector module.
/// Exposes every `/proc/meminfo` field.
///
/// Available when:
/// - `minimal` or `standard` features are enabled on Linux, OR
/// - `collector-memory` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-memory", target_os = "linux"))]
pub mod ram;

/// Registry of collectors and the compile-time catalog feeding it.
pub mod registry;

/// The collector contract and the host handle passed to `build`.
pub mod traits;

/// Common type aliases.
pub mod types;

/// System uptime collector module.
///
/// Available when:
/// - `standard` feature is enabled on Linux, OR
/// - `collector-uptime` feature is explicitly enabled on Linux
#[cfg(all(feature = "collector-uptime", target_os = "linux"))]
pub mod uptime;

/// Load average collector types and implementations.
#[cfg(all(feature = "collector-loadavg", target_os = "linux"))]
pub use avg::{LoadAverage, LoadAverageCollector};
/// CPU collector types and implementations.
#[cfg(all(feature = "collector-cpu", target_os = "linux"))]
pub use cpu::{CpuCollector, CpuStats};
/// Entropy collector types and implementations.
#[cfg(all(feature = "collector-entropy", target_os = "linux"))]
pub use entropy::{EntropyCollector, EntropyStats};
/// Collector error types.
pub use error::{CollectorError, InitializeError};
/// File descriptor collector types and implementations.
#[cfg(all(feature = "collector-filefd", target_os = "linux"))]
pub use filefd::{FileFdStats, FilefdCollector};
/// Pressure Stall Information (PSI) collector types and implementations.
#[cfg(all(feature = "collector-pressure", target_os = "linux"))]
pub use pressure::{PressureCollector, PressureStats};
/// Memory statistics collector types and implementations.
#[cfg(all(feature = "collector-memory", target_os = "linux"))]
pub use ram::{MemoryCollector, MemoryStats};
/// Collector registry.
pub use registry::{CollectorMeta, Registry};
/// Core trait for collectors.
pub use traits::{Collector, Host};
/// Common result type for collector operations.
pub use types::CollectorResult;
/// System uptime collector types and implementations.
#[cfg(all(feature = "collector-uptime", target_os = "linux"))]
pub use uptime::{UptimeCollector, UptimeInfo};
