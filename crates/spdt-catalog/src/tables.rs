//! redb table definitions for the catalog store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Performance profiles keyed by `ResourceLimit::key()` (`{cpu}:{mem}`).
pub const PERFORMANCE_PROFILES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("performance_profiles");

/// VM profiles keyed by VM type.
pub const VM_PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("vm_profiles");

/// VM booting/shutdown times keyed by VM type.
pub const VM_BOOT_TIMES: TableDefinition<&str, &[u8]> = TableDefinition::new("vm_boot_times");

/// Latest forecast keyed by service name.
pub const FORECASTS: TableDefinition<&str, &[u8]> = TableDefinition::new("forecasts");

/// Derived policies keyed by policy id.
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Shape shared by every catalog table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;
