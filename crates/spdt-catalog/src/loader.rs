//! JSON file loaders for catalog data, forecasts, and live state.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use spdt_core::{
    Forecast, InfrastructureState, PerformanceProfile, PerformanceSetting, ResourceLimit,
    VmBootProfile, VmProfile,
};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::store::CatalogStore;
use crate::traits::LiveStateObserver;

fn read_json<T: DeserializeOwned>(path: &Path) -> CatalogResult<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CatalogError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| CatalogError::Deserialize(format!("{}: {e}", path.display())))
}

pub fn load_vm_profiles(path: &Path) -> CatalogResult<Vec<VmProfile>> {
    let profiles: Vec<VmProfile> = read_json(path)?;
    debug!(?path, count = profiles.len(), "vm profiles loaded");
    Ok(profiles)
}

pub fn load_vm_boot_times(path: &Path) -> CatalogResult<Vec<VmBootProfile>> {
    read_json(path)
}

pub fn load_forecast(path: &Path) -> CatalogResult<Forecast> {
    let forecast: Forecast = read_json(path)?;
    debug!(?path, samples = forecast.values.len(), "forecast loaded");
    Ok(forecast)
}

pub fn load_live_state(path: &Path) -> CatalogResult<InfrastructureState> {
    read_json(path)
}

// ── Performance profiles ───────────────────────────────────────────

#[derive(Deserialize)]
struct ServiceProfileDoc {
    #[serde(rename = "Profiles")]
    profiles: Vec<LimitProfileDoc>,
}

#[derive(Deserialize)]
struct LimitProfileDoc {
    #[serde(rename = "Limits")]
    limits: LimitsDoc,
    #[serde(rename = "MSCs", default)]
    mscs: Vec<MscDoc>,
}

#[derive(Deserialize)]
struct LimitsDoc {
    #[serde(rename = "Cpu_cores")]
    cpu_cores: f64,
    #[serde(rename = "Mem_gb")]
    mem_gb: f64,
}

#[derive(Deserialize)]
struct MscDoc {
    #[serde(rename = "Replicas")]
    replicas: u32,
    #[serde(rename = "Pod_boot_time_ms", default)]
    boot_time_ms: f64,
    #[serde(rename = "Sd_Pod_boot_time_ms", default)]
    sd_boot_time_ms: f64,
    #[serde(rename = "Maximum_service_capacity_per_sec")]
    msc_per_sec: MscValueDoc,
}

#[derive(Deserialize)]
struct MscValueDoc {
    #[serde(rename = "RegBruteForce", default)]
    reg_brute_force: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfilesFile {
    Service(ServiceProfileDoc),
    Plain(Vec<PerformanceProfile>),
}

impl From<ServiceProfileDoc> for Vec<PerformanceProfile> {
    fn from(doc: ServiceProfileDoc) -> Self {
        doc.profiles
            .into_iter()
            .map(|p| PerformanceProfile {
                limit: ResourceLimit::new(p.limits.cpu_cores, p.limits.mem_gb),
                settings: p
                    .mscs
                    .into_iter()
                    .map(|m| PerformanceSetting {
                        replicas: m.replicas,
                        msc_per_second: m.msc_per_sec.reg_brute_force,
                        boot_time_secs: m.boot_time_ms / 1000.0,
                        boot_time_std_dev_secs: m.sd_boot_time_ms / 1000.0,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Load performance profiles.
///
/// Accepts either a service profile document (`Profiles` with `Limits` and
/// `MSCs`, boot times in milliseconds) or a plain list of profiles.
pub fn load_performance_profiles(path: &Path) -> CatalogResult<Vec<PerformanceProfile>> {
    let profiles = match read_json::<ProfilesFile>(path)? {
        ProfilesFile::Service(doc) => doc.into(),
        ProfilesFile::Plain(profiles) => profiles,
    };
    debug!(?path, count = profiles.len(), "performance profiles loaded");
    Ok(profiles)
}

/// Populate a store from catalog files. Boot times are optional.
pub fn seed_store(
    store: &CatalogStore,
    vm_profiles: &Path,
    performance_profiles: &Path,
    vm_boot_times: Option<&Path>,
) -> CatalogResult<()> {
    for profile in load_vm_profiles(vm_profiles)? {
        store.put_vm_profile(&profile)?;
    }
    for profile in load_performance_profiles(performance_profiles)? {
        store.put_performance_profile(&profile)?;
    }
    if let Some(path) = vm_boot_times {
        for profile in load_vm_boot_times(path)? {
            store.put_boot_profile(&profile)?;
        }
    }
    Ok(())
}

/// Live-state observer that always reports the same state.
#[derive(Debug, Clone)]
pub struct StaticLiveState {
    state: InfrastructureState,
}

impl StaticLiveState {
    pub fn new(state: InfrastructureState) -> Self {
        Self { state }
    }

    pub fn from_file(path: &Path) -> CatalogResult<Self> {
        Ok(Self::new(load_live_state(path)?))
    }
}

impl LiveStateObserver for StaticLiveState {
    fn current_state(&self) -> CatalogResult<InfrastructureState> {
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ProfileCatalog, VmTimesStore};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn service_profile_document_converts_ms_to_secs() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "profiles.json",
            r#"{
              "ServiceName": "api",
              "Profiles": [{
                "Limits": {"Cpu_cores": 0.5, "Mem_gb": 1.0, "Request_per_second": 0},
                "MSCs": [{
                  "Replicas": 2,
                  "Pod_boot_time_ms": 1500,
                  "Sd_Pod_boot_time_ms": 200,
                  "Maximum_service_capacity_per_sec": {"RegBruteForce": 42.0}
                }]
              }]
            }"#,
        );
        let profiles = load_performance_profiles(&path).unwrap();
        assert_eq!(profiles.len(), 1);
        let setting = profiles[0].settings[0];
        assert_eq!(profiles[0].limit, ResourceLimit::new(0.5, 1.0));
        assert_eq!(setting.msc_per_second, 42.0);
        assert!((setting.boot_time_secs - 1.5).abs() < 1e-9);
        assert!((setting.boot_time_std_dev_secs - 0.2).abs() < 1e-9);
    }

    #[test]
    fn plain_profile_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "profiles.json",
            r#"[{"limit": {"cpu_cores": 1.0, "mem_gb": 2.0},
                 "settings": [{"replicas": 1, "msc_per_second": 50.0, "boot_time_secs": 10.0}]}]"#,
        );
        let profiles = load_performance_profiles(&path).unwrap();
        assert_eq!(profiles[0].settings[0].replicas, 1);
    }

    #[test]
    fn live_state_accepts_scale_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "state.json",
            r#"{"services": {"api": {"scale": 3, "cpu": 0.5, "memory": 1.0}},
                "vms": {"t2.large": 2}}"#,
        );
        let observer = StaticLiveState::from_file(&path).unwrap();
        let state = observer.current_state().unwrap();
        assert_eq!(state.service("api").unwrap().replicas, 3);
        assert_eq!(state.vms.get("t2.large"), 2);
    }

    #[test]
    fn seed_store_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let vms = write(
            &dir,
            "vms.json",
            r#"[{"type": "t2.large", "cpu_cores": 2, "mem_gb": 8, "pricing": {"price": 0.1}}]"#,
        );
        let profiles = write(
            &dir,
            "profiles.json",
            r#"[{"limit": {"cpu_cores": 1.0, "mem_gb": 2.0},
                 "settings": [{"replicas": 1, "msc_per_second": 50.0, "boot_time_secs": 10.0}]}]"#,
        );
        let boots = write(
            &dir,
            "boot.json",
            r#"[{"VMType": "t2.large",
                 "InstanceValues": [{"NumInstances": 1, "BootTime": 45.0, "ShutDownTime": 30.0}]}]"#,
        );

        let store = CatalogStore::open_in_memory().unwrap();
        seed_store(&store, &vms, &profiles, Some(&boots)).unwrap();

        assert!(store.vm_catalog().unwrap().contains("t2.large"));
        assert!(
            store
                .find_by_limit_and_replicas(&ResourceLimit::new(1.0, 2.0), 1)
                .unwrap()
                .is_some()
        );
        assert_eq!(
            store.boot_shutdown_time("t2.large", 1).unwrap().unwrap().boot_secs,
            45.0
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_forecast(Path::new("/nonexistent/forecast.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
