//! CatalogStore: redb-backed profile catalog.
//!
//! Holds VM profiles, performance profiles, VM booting times, the latest
//! forecast per service, and derived policies. Values are JSON-serialized
//! into `&[u8]` columns. Read-modify-write updates run inside a single write
//! transaction, so concurrent strategies never insert duplicate settings.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use spdt_core::{
    BootShutdownTime, ContainerConfiguration, Forecast, PerformanceProfile, PerformanceSetting,
    Policy, ResourceLimit, VmBootProfile, VmCatalog, VmProfile, VmSet,
};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::tables::*;
use crate::traits::{ProfileCatalog, VmTimesStore};

/// Convert any `Display` error into a `CatalogError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| CatalogError::$variant(e.to_string())
    };
}

/// Thread-safe catalog store backed by redb.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    /// Open (or create) a persistent catalog at the given path.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "catalog store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory catalog.
    pub fn open_in_memory() -> CatalogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory catalog store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> CatalogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(PERFORMANCE_PROFILES).map_err(map_err!(Table))?;
        txn.open_table(VM_PROFILES).map_err(map_err!(Table))?;
        txn.open_table(VM_BOOT_TIMES).map_err(map_err!(Table))?;
        txn.open_table(FORECASTS).map_err(map_err!(Table))?;
        txn.open_table(POLICIES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic helpers ────────────────────────────────────────────

    fn put<T: serde::Serialize>(
        &self,
        table_def: JsonTable,
        key: &str,
        value: &T,
    ) -> CatalogResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        table_def: JsonTable,
        key: &str,
    ) -> CatalogResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list<T: serde::de::DeserializeOwned>(
        &self,
        table_def: JsonTable,
    ) -> CatalogResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
        }
        Ok(results)
    }

    // ── VM profiles ────────────────────────────────────────────────

    pub fn put_vm_profile(&self, profile: &VmProfile) -> CatalogResult<()> {
        self.put(VM_PROFILES, &profile.vm_type, profile)?;
        debug!(vm_type = %profile.vm_type, "vm profile stored");
        Ok(())
    }

    pub fn get_vm_profile(&self, vm_type: &str) -> CatalogResult<Option<VmProfile>> {
        self.get(VM_PROFILES, vm_type)
    }

    /// Snapshot of every stored VM profile.
    pub fn vm_catalog(&self) -> CatalogResult<VmCatalog> {
        let profiles: Vec<VmProfile> = self.list(VM_PROFILES)?;
        Ok(VmCatalog::new(profiles))
    }

    // ── Performance profiles ───────────────────────────────────────

    pub fn put_performance_profile(&self, profile: &PerformanceProfile) -> CatalogResult<()> {
        let key = profile.limit.key();
        let mut profile = profile.clone();
        profile.settings.sort_by_key(|s| s.replicas);
        self.put(PERFORMANCE_PROFILES, &key, &profile)?;
        debug!(%key, settings = profile.settings.len(), "performance profile stored");
        Ok(())
    }

    pub fn list_performance_profiles(&self) -> CatalogResult<Vec<PerformanceProfile>> {
        self.list(PERFORMANCE_PROFILES)
    }

    // ── Booting times ──────────────────────────────────────────────

    pub fn put_boot_profile(&self, profile: &VmBootProfile) -> CatalogResult<()> {
        self.put(VM_BOOT_TIMES, &profile.vm_type, profile)
    }

    pub fn get_boot_profile(&self, vm_type: &str) -> CatalogResult<Option<VmBootProfile>> {
        self.get(VM_BOOT_TIMES, vm_type)
    }

    pub fn list_boot_profiles(&self) -> CatalogResult<Vec<VmBootProfile>> {
        self.list(VM_BOOT_TIMES)
    }

    // ── Forecasts ──────────────────────────────────────────────────

    /// Store the latest forecast of a service, replacing the previous one.
    pub fn put_forecast(&self, forecast: &Forecast) -> CatalogResult<()> {
        self.put(FORECASTS, &forecast.service_name, forecast)?;
        debug!(service = %forecast.service_name, samples = forecast.values.len(), "forecast stored");
        Ok(())
    }

    pub fn latest_forecast(&self, service_name: &str) -> CatalogResult<Option<Forecast>> {
        self.get(FORECASTS, service_name)
    }

    // ── Policies ───────────────────────────────────────────────────

    pub fn put_policy(&self, policy: &Policy) -> CatalogResult<()> {
        self.put(POLICIES, &policy.id, policy)?;
        debug!(id = %policy.id, algorithm = %policy.algorithm, "policy stored");
        Ok(())
    }

    pub fn get_policy(&self, id: &str) -> CatalogResult<Option<Policy>> {
        self.get(POLICIES, id)
    }

    pub fn list_policies(&self) -> CatalogResult<Vec<Policy>> {
        self.list(POLICIES)
    }
}

impl ProfileCatalog for CatalogStore {
    fn find_by_limit_and_replicas(
        &self,
        limit: &ResourceLimit,
        replicas: u32,
    ) -> CatalogResult<Option<PerformanceSetting>> {
        let profile = self.find_profile_by_limit(limit)?;
        Ok(profile.and_then(|p| p.setting_for(replicas).copied()))
    }

    fn find_profile_by_limit(
        &self,
        limit: &ResourceLimit,
    ) -> CatalogResult<Option<PerformanceProfile>> {
        self.get(PERFORMANCE_PROFILES, &limit.key())
    }

    fn find_all_under_limit(
        &self,
        cpu_ceiling: f64,
        mem_ceiling: f64,
    ) -> CatalogResult<Vec<ResourceLimit>> {
        let mut limits: Vec<ResourceLimit> = self
            .list_performance_profiles()?
            .into_iter()
            .map(|p| p.limit)
            .filter(|l| l.fits_under(cpu_ceiling, mem_ceiling))
            .collect();
        limits.sort_by(|a, b| {
            a.cpu_cores
                .total_cmp(&b.cpu_cores)
                .then(a.mem_gb.total_cmp(&b.mem_gb))
        });
        Ok(limits)
    }

    fn match_under_limits_above_rate(
        &self,
        cpu_ceiling: f64,
        mem_ceiling: f64,
        min_rate: f64,
    ) -> CatalogResult<Vec<ContainerConfiguration>> {
        let mut matches = Vec::new();
        for profile in self.list_performance_profiles()? {
            if !profile.limit.fits_under(cpu_ceiling, mem_ceiling) {
                continue;
            }
            for setting in &profile.settings {
                if setting.msc_per_second >= min_rate {
                    matches.push(ContainerConfiguration {
                        limit: profile.limit,
                        setting: *setting,
                        vms: VmSet::new(),
                    });
                }
            }
        }
        matches.sort_by(|a, b| {
            a.limit
                .cpu_cores
                .total_cmp(&b.limit.cpu_cores)
                .then(a.limit.mem_gb.total_cmp(&b.limit.mem_gb))
                .then(a.setting.replicas.cmp(&b.setting.replicas))
                .then(a.setting.msc_per_second.total_cmp(&b.setting.msc_per_second))
        });
        Ok(matches)
    }

    fn upsert_setting(
        &self,
        limit: &ResourceLimit,
        setting: PerformanceSetting,
    ) -> CatalogResult<()> {
        let key = limit.key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PERFORMANCE_PROFILES).map_err(map_err!(Table))?;
            let existing = table
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec());
            let mut profile = match existing {
                Some(bytes) => serde_json::from_slice::<PerformanceProfile>(&bytes)
                    .map_err(map_err!(Deserialize))?,
                None => PerformanceProfile {
                    limit: *limit,
                    settings: Vec::new(),
                },
            };
            profile.settings.retain(|s| s.replicas != setting.replicas);
            profile.settings.push(setting);
            profile.settings.sort_by_key(|s| s.replicas);
            let bytes = serde_json::to_vec(&profile).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, replicas = setting.replicas, msc = setting.msc_per_second, "performance setting upserted");
        Ok(())
    }
}

impl VmTimesStore for CatalogStore {
    /// Exact match on the instance count, else the closest recorded count.
    fn boot_shutdown_time(
        &self,
        vm_type: &str,
        count: u32,
    ) -> CatalogResult<Option<BootShutdownTime>> {
        let Some(profile) = self.get_boot_profile(vm_type)? else {
            return Ok(None);
        };
        Ok(profile
            .values
            .iter()
            .min_by_key(|v| v.instances.abs_diff(count))
            .copied())
    }

    fn record_boot_shutdown_time(
        &self,
        vm_type: &str,
        times: BootShutdownTime,
    ) -> CatalogResult<()> {
        let mut profile = self.get_boot_profile(vm_type)?.unwrap_or_else(|| VmBootProfile {
            vm_type: vm_type.to_string(),
            values: Vec::new(),
        });
        profile.values.retain(|v| v.instances != times.instances);
        profile.values.push(times);
        profile.values.sort_by_key(|v| v.instances);
        self.put_boot_profile(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use spdt_core::Pricing;

    fn setting(replicas: u32, msc: f64) -> PerformanceSetting {
        PerformanceSetting {
            replicas,
            msc_per_second: msc,
            boot_time_secs: 10.0,
            boot_time_std_dev_secs: 0.0,
        }
    }

    fn vm(vm_type: &str, cpu: f64, mem: f64, price: f64) -> VmProfile {
        VmProfile {
            vm_type: vm_type.to_string(),
            cpu_cores: cpu,
            mem_gb: mem,
            os: "linux".to_string(),
            pricing: Pricing {
                price,
                unit: "USD".to_string(),
            },
        }
    }

    fn seeded() -> CatalogStore {
        let store = CatalogStore::open_in_memory().unwrap();
        store
            .put_performance_profile(&PerformanceProfile {
                limit: ResourceLimit::new(1.0, 2.0),
                settings: vec![setting(2, 100.0), setting(1, 50.0)],
            })
            .unwrap();
        store
            .put_performance_profile(&PerformanceProfile {
                limit: ResourceLimit::new(0.5, 1.0),
                settings: vec![setting(1, 20.0), setting(3, 60.0)],
            })
            .unwrap();
        store
            .put_performance_profile(&PerformanceProfile {
                limit: ResourceLimit::new(4.0, 8.0),
                settings: vec![setting(1, 200.0)],
            })
            .unwrap();
        store
    }

    // ── VM profiles ────────────────────────────────────────────────

    #[test]
    fn vm_catalog_snapshot() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.put_vm_profile(&vm("t2.micro", 1.0, 1.0, 0.01)).unwrap();
        store.put_vm_profile(&vm("t2.large", 2.0, 8.0, 0.1)).unwrap();

        let catalog = store.vm_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("t2.large").unwrap().price(), 0.1);
        assert_eq!(store.get_vm_profile("t2.micro").unwrap().unwrap().cpu_cores, 1.0);
        assert!(store.get_vm_profile("missing").unwrap().is_none());
    }

    // ── Performance profiles ───────────────────────────────────────

    #[test]
    fn find_by_limit_and_replicas() {
        let store = seeded();
        let limit = ResourceLimit::new(1.0, 2.0);
        let found = store.find_by_limit_and_replicas(&limit, 2).unwrap().unwrap();
        assert_eq!(found.msc_per_second, 100.0);
        assert!(store.find_by_limit_and_replicas(&limit, 7).unwrap().is_none());
        assert!(
            store
                .find_by_limit_and_replicas(&ResourceLimit::new(9.0, 9.0), 1)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn stored_settings_are_sorted_by_replicas() {
        let store = seeded();
        let profile = store
            .find_profile_by_limit(&ResourceLimit::new(1.0, 2.0))
            .unwrap()
            .unwrap();
        let replicas: Vec<u32> = profile.settings.iter().map(|s| s.replicas).collect();
        assert_eq!(replicas, vec![1, 2]);
    }

    #[test]
    fn all_under_limit_sorted_by_cpu() {
        let store = seeded();
        let limits = store.find_all_under_limit(2.0, 4.0).unwrap();
        assert_eq!(
            limits,
            vec![ResourceLimit::new(0.5, 1.0), ResourceLimit::new(1.0, 2.0)]
        );
    }

    #[test]
    fn match_above_rate_filters_and_orders() {
        let store = seeded();
        let matches = store.match_under_limits_above_rate(2.0, 4.0, 55.0).unwrap();
        let pairs: Vec<(f64, u32)> = matches
            .iter()
            .map(|c| (c.limit.cpu_cores, c.setting.replicas))
            .collect();
        assert_eq!(pairs, vec![(0.5, 3), (1.0, 2)]);
    }

    #[test]
    fn upsert_replaces_same_replica_count() {
        let store = seeded();
        let limit = ResourceLimit::new(1.0, 2.0);
        store.upsert_setting(&limit, setting(2, 120.0)).unwrap();
        store.upsert_setting(&limit, setting(5, 240.0)).unwrap();

        let profile = store.find_profile_by_limit(&limit).unwrap().unwrap();
        assert_eq!(profile.settings.len(), 3);
        assert_eq!(profile.setting_for(2).unwrap().msc_per_second, 120.0);
        assert_eq!(profile.settings.last().unwrap().replicas, 5);
    }

    #[test]
    fn upsert_creates_missing_profile() {
        let store = CatalogStore::open_in_memory().unwrap();
        let limit = ResourceLimit::new(0.25, 0.5);
        store.upsert_setting(&limit, setting(4, 80.0)).unwrap();
        let found = store.find_by_limit_and_replicas(&limit, 4).unwrap().unwrap();
        assert_eq!(found.msc_per_second, 80.0);
    }

    #[test]
    fn concurrent_upserts_do_not_duplicate() {
        let store = CatalogStore::open_in_memory().unwrap();
        let limit = ResourceLimit::new(1.0, 2.0);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .upsert_setting(&limit, setting(3, 100.0 + i as f64))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let profile = store.find_profile_by_limit(&limit).unwrap().unwrap();
        assert_eq!(profile.settings.len(), 1);
    }

    // ── Booting times ──────────────────────────────────────────────

    #[test]
    fn boot_times_closest_instance_count() {
        let store = CatalogStore::open_in_memory().unwrap();
        store
            .record_boot_shutdown_time(
                "t2.large",
                BootShutdownTime { instances: 1, boot_secs: 40.0, shutdown_secs: 30.0 },
            )
            .unwrap();
        store
            .record_boot_shutdown_time(
                "t2.large",
                BootShutdownTime { instances: 4, boot_secs: 60.0, shutdown_secs: 45.0 },
            )
            .unwrap();

        let exact = store.boot_shutdown_time("t2.large", 1).unwrap().unwrap();
        assert_eq!(exact.boot_secs, 40.0);
        let near = store.boot_shutdown_time("t2.large", 5).unwrap().unwrap();
        assert_eq!(near.instances, 4);
        assert!(store.boot_shutdown_time("m5.large", 1).unwrap().is_none());
    }

    // ── Forecasts and policies ─────────────────────────────────────

    #[test]
    fn forecast_replaced_per_service() {
        let store = CatalogStore::open_in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut forecast = Forecast {
            id: "f1".to_string(),
            service_name: "api".to_string(),
            values: vec![],
            start_time: t0,
            end_time: t0,
        };
        store.put_forecast(&forecast).unwrap();
        forecast.id = "f2".to_string();
        store.put_forecast(&forecast).unwrap();
        assert_eq!(store.latest_forecast("api").unwrap().unwrap().id, "f2");
        assert!(store.latest_forecast("web").unwrap().is_none());
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.redb");
        {
            let store = CatalogStore::open(&path).unwrap();
            store.put_vm_profile(&vm("t2.large", 2.0, 8.0, 0.1)).unwrap();
        }
        let store = CatalogStore::open(&path).unwrap();
        assert!(store.vm_catalog().unwrap().contains("t2.large"));
    }

    #[test]
    fn empty_store_operations() {
        let store = CatalogStore::open_in_memory().unwrap();
        assert!(store.vm_catalog().unwrap().is_empty());
        assert!(store.list_policies().unwrap().is_empty());
        assert!(store.find_all_under_limit(100.0, 100.0).unwrap().is_empty());
        assert!(store.get_policy("nope").unwrap().is_none());
    }
}
