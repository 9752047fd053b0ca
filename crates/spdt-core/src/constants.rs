//! Fixed engine constants.

/// Fraction of a VM's CPU reserved for cluster-management processes.
pub const CLUSTER_RESERVED_CPU_FRACTION: f64 = 0.06;

/// Fraction of a VM's memory reserved for cluster-management processes.
pub const CLUSTER_RESERVED_MEM_FRACTION: f64 = 0.25;

/// Samples closer than this to the start of the open interval are merged into it.
pub const INTERVAL_COALESCE_WINDOW_SECS: i64 = 300;

/// Seconds for a freshly booted VM to join the cluster.
pub const NODE_JOIN_SECS: f64 = 120.0;

/// Seconds to start containers when no new VMs are needed.
pub const CONTAINER_START_SECS: f64 = 10.0;

/// Boot time used when the booting-time store has no entry.
pub const DEFAULT_VM_BOOT_SECS: f64 = 20.0;

/// Shutdown time used when the booting-time store has no entry.
pub const DEFAULT_VM_SHUTDOWN_SECS: f64 = 35.0;

/// Pod boot time assumed when a performance setting carries none.
pub const DEFAULT_POD_BOOT_SECS: f64 = 20.0;

/// Upper bound on instances of one VM type in a candidate set.
pub const DEFAULT_MAX_CLUSTER_SIZE: u32 = 100;

/// Per-strategy wall-clock limit for concurrent derivation.
pub const DEFAULT_STRATEGY_TIMEOUT_SECS: u64 = 30;

/// RMSE above which a new forecast counts as a significant change.
pub const FORECAST_RMSE_THRESHOLD: f64 = 1.0;
