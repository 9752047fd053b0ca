//! VM set bin-packing.

use spdt_core::constants::{CLUSTER_RESERVED_CPU_FRACTION, CLUSTER_RESERVED_MEM_FRACTION};
use spdt_core::{ResourceLimit, VmCatalog, VmProfile, VmSet};
use tracing::trace;

use crate::error::{DerivationError, DerivationResult};

/// CPU and memory of a VM left for replicas after the cluster reservation.
pub fn available_resources(vm: &VmProfile) -> (f64, f64) {
    (
        vm.cpu_cores * (1.0 - CLUSTER_RESERVED_CPU_FRACTION),
        vm.mem_gb * (1.0 - CLUSTER_RESERVED_MEM_FRACTION),
    )
}

/// Number of replicas with `limit` one VM of this type can host.
pub fn max_replica_capacity(vm: &VmProfile, limit: &ResourceLimit) -> u32 {
    if limit.cpu_cores <= 0.0 || limit.mem_gb <= 0.0 {
        return 0;
    }
    let (cpu, mem) = available_resources(vm);
    let replicas = (cpu / limit.cpu_cores).min(mem / limit.mem_gb).floor();
    if replicas <= 0.0 { 0 } else { replicas as u32 }
}

/// Homogeneous set of one VM type hosting `target` replicas, if it fits in
/// the cluster size bound.
pub fn homogeneous_set_of_type(
    target: u32,
    limit: &ResourceLimit,
    vm: &VmProfile,
    max_cluster_size: u32,
) -> Option<VmSet> {
    let capacity = max_replica_capacity(vm, limit);
    if capacity == 0 {
        return None;
    }
    let count = target.div_ceil(capacity);
    (count <= max_cluster_size).then(|| VmSet::single(&vm.vm_type, count))
}

/// Cheapest single-type VM set hosting `target` replicas.
///
/// Candidates are ranked by total price, then VM count, then type name.
pub fn build_homogeneous_set(
    target: u32,
    limit: &ResourceLimit,
    vms: &VmCatalog,
    max_cluster_size: u32,
) -> DerivationResult<VmSet> {
    if target == 0 {
        return Ok(VmSet::new());
    }
    let mut best: Option<(f64, u32, &str, VmSet)> = None;
    for vm in vms.iter() {
        let Some(set) = homogeneous_set_of_type(target, limit, vm, max_cluster_size) else {
            continue;
        };
        let count = set.total_vms();
        let cost = vm.price() * count as f64;
        let better = match &best {
            None => true,
            Some((best_cost, best_count, best_type, _)) => cost
                .total_cmp(best_cost)
                .then(count.cmp(best_count))
                .then(vm.vm_type.as_str().cmp(best_type))
                .is_lt(),
        };
        if better {
            best = Some((cost, count, vm.vm_type.as_str(), set));
        }
    }
    let (cost, _, vm_type, set) = best.ok_or(DerivationError::NoSuitableVms {
        replicas: target,
        limit: *limit,
    })?;
    trace!(target, %limit, vm_type, cost, "homogeneous set built");
    Ok(set)
}

/// VMs to add and to remove to go from `current` to `candidate`.
pub fn delta_vm_set(current: &VmSet, candidate: &VmSet) -> (VmSet, VmSet) {
    let mut added = VmSet::new();
    let mut removed = VmSet::new();
    for (vm_type, count) in current.iter() {
        let target = candidate.get(vm_type);
        if count > target {
            removed.add(vm_type, count - target);
        }
    }
    for (vm_type, count) in candidate.iter() {
        let existing = current.get(vm_type);
        if count > existing {
            added.add(vm_type, count - existing);
        }
    }
    (added, removed)
}

/// Release whole VMs so that at most `excess_replicas` of capacity is shed.
///
/// Groups are visited from the fewest instances to the most. A VM is only
/// released if doing so does not overshoot the excess; releasing stops once
/// the excess is met. Returns the remaining set.
pub fn release_vms(
    current: &VmSet,
    excess_replicas: u32,
    limit: &ResourceLimit,
    vms: &VmCatalog,
) -> DerivationResult<VmSet> {
    let mut groups: Vec<(&str, u32)> = current.iter().collect();
    groups.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));

    let mut remaining = current.clone();
    let mut released = 0u32;
    for (vm_type, count) in groups {
        if released >= excess_replicas {
            break;
        }
        let vm = vms
            .get(vm_type)
            .ok_or_else(|| DerivationError::UnknownVmType(vm_type.to_string()))?;
        let capacity = max_replica_capacity(vm, limit);
        for _ in 0..count {
            if released >= excess_replicas || released + capacity > excess_replicas {
                break;
            }
            remaining.remove(vm_type, 1);
            released += capacity;
        }
    }
    trace!(excess_replicas, released, "vms released");
    Ok(remaining)
}

/// Hourly price of a VM set.
pub fn vm_set_cost(set: &VmSet, vms: &VmCatalog) -> DerivationResult<f64> {
    set.iter().try_fold(0.0, |acc, (vm_type, count)| {
        let vm = vms
            .get(vm_type)
            .ok_or_else(|| DerivationError::UnknownVmType(vm_type.to_string()))?;
        Ok(acc + vm.price() * count as f64)
    })
}

/// Replicas with `limit` a VM set can host.
pub fn vm_set_replica_capacity(
    set: &VmSet,
    limit: &ResourceLimit,
    vms: &VmCatalog,
) -> DerivationResult<u32> {
    set.iter().try_fold(0u32, |acc, (vm_type, count)| {
        let vm = vms
            .get(vm_type)
            .ok_or_else(|| DerivationError::UnknownVmType(vm_type.to_string()))?;
        Ok(acc + max_replica_capacity(vm, limit) * count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spdt_core::Pricing;

    fn make_vm(vm_type: &str, cpu: f64, mem: f64, price: f64) -> VmProfile {
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

    fn test_catalog() -> VmCatalog {
        VmCatalog::new([
            make_vm("small", 2.0, 4.0, 0.1),
            make_vm("medium", 4.0, 16.0, 1.0),
            make_vm("large", 8.0, 32.0, 1.5),
        ])
    }

    fn limit() -> ResourceLimit {
        ResourceLimit::new(1.0, 2.0)
    }

    #[test]
    fn capacity_reserves_cluster_overhead() {
        // 4 * 0.94 = 3.76 cpu, 16 * 0.75 = 12 GB
        assert_eq!(max_replica_capacity(&make_vm("t", 4.0, 16.0, 1.0), &limit()), 3);
        // 2 * 0.94 = 1.88 cpu, 4 * 0.75 = 3 GB
        assert_eq!(max_replica_capacity(&make_vm("t", 2.0, 4.0, 1.0), &limit()), 1);
        assert_eq!(max_replica_capacity(&make_vm("t", 1.0, 2.0, 1.0), &limit()), 0);
    }

    #[test]
    fn capacity_is_monotone_in_vm_size() {
        let mut last = 0;
        for step in 1..32 {
            let size = step as f64;
            let cap = max_replica_capacity(&make_vm("t", size, size * 4.0, 1.0), &limit());
            assert!(cap >= last);
            last = cap;
        }
    }

    #[test]
    fn zero_limit_has_no_capacity() {
        let vm = make_vm("t", 4.0, 16.0, 1.0);
        assert_eq!(max_replica_capacity(&vm, &ResourceLimit::new(0.0, 1.0)), 0);
    }

    #[test]
    fn homogeneous_set_picks_cheapest() {
        // small: cap 1 -> 10 VMs * 0.1 = 1.0; medium: cap 3 -> 4 * 1.0; large: cap 7 -> 2 * 1.5
        let set = build_homogeneous_set(10, &limit(), &test_catalog(), 100).unwrap();
        assert_eq!(set, VmSet::single("small", 10));
    }

    #[test]
    fn homogeneous_set_respects_cluster_size() {
        let set = build_homogeneous_set(10, &limit(), &test_catalog(), 5).unwrap();
        assert_eq!(set, VmSet::single("large", 2));
    }

    #[test]
    fn homogeneous_set_covers_target() {
        let catalog = test_catalog();
        for target in 1..40 {
            let set = build_homogeneous_set(target, &limit(), &catalog, 100).unwrap();
            let capacity = vm_set_replica_capacity(&set, &limit(), &catalog).unwrap();
            assert!(capacity >= target, "target {target} got capacity {capacity}");
            assert_eq!(set.type_count(), 1);
        }
    }

    #[test]
    fn no_suitable_vms_for_oversized_limit() {
        let err = build_homogeneous_set(1, &ResourceLimit::new(64.0, 1.0), &test_catalog(), 100)
            .unwrap_err();
        assert!(matches!(err, DerivationError::NoSuitableVms { replicas: 1, .. }));
    }

    #[test]
    fn delta_reconstructs_candidate() {
        let a: VmSet = [("x".to_string(), 3), ("y".to_string(), 1)].into_iter().collect();
        let b: VmSet = [("y".to_string(), 4), ("z".to_string(), 2)].into_iter().collect();
        let (added, removed) = delta_vm_set(&a, &b);
        for t in ["x", "y", "z"] {
            assert_eq!(a.get(t) + added.get(t) - removed.get(t), b.get(t));
        }
        assert_eq!(removed, VmSet::single("x", 3));
    }

    #[test]
    fn delta_of_equal_sets_is_empty() {
        let a = VmSet::single("x", 2);
        let (added, removed) = delta_vm_set(&a, &a);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn release_smallest_group_first() {
        let catalog = VmCatalog::new([make_vm("a", 4.0, 16.0, 1.0), make_vm("b", 4.0, 16.0, 1.0)]);
        let current: VmSet = [("a".to_string(), 1), ("b".to_string(), 3)].into_iter().collect();
        let excess = max_replica_capacity(catalog.get("a").unwrap(), &limit());
        let remaining = release_vms(&current, excess, &limit(), &catalog).unwrap();
        assert_eq!(remaining.get("a"), 0);
        assert_eq!(remaining.get("b"), 3);
    }

    #[test]
    fn release_never_overshoots() {
        let catalog = test_catalog();
        // large hosts 7 replicas; releasing one would overshoot an excess of 5
        let current: VmSet = [("large".to_string(), 2), ("small".to_string(), 3)]
            .into_iter()
            .collect();
        let remaining = release_vms(&current, 5, &limit(), &catalog).unwrap();
        assert_eq!(remaining.get("large"), 2);
        assert_eq!(remaining.get("small"), 0);
    }

    #[test]
    fn release_unknown_type_fails() {
        let current = VmSet::single("ghost", 1);
        let err = release_vms(&current, 1, &limit(), &test_catalog()).unwrap_err();
        assert!(matches!(err, DerivationError::UnknownVmType(t) if t == "ghost"));
    }

    #[test]
    fn cost_and_capacity_of_mixed_set() {
        let catalog = test_catalog();
        let set: VmSet = [("small".to_string(), 2), ("large".to_string(), 1)]
            .into_iter()
            .collect();
        assert!((vm_set_cost(&set, &catalog).unwrap() - 1.7).abs() < 1e-9);
        assert_eq!(vm_set_replica_capacity(&set, &limit(), &catalog).unwrap(), 9);
    }
}
