//! Hardware state verification utilities.
//!
//! These read programmed forwarding entries straight back out of a backend
//! and normalize them so software-side expectations compare with `==`. The
//! vendor SDK exposes ECMP membership through two incompatible API
//! generations; the capability flag on the platform descriptor decides which
//! read path is taken, and both fold into the same multiset representation.

use hwsync_hal::{
    AsicFeature, EcmpGroupId, EgressId, EgressMultiset, HwBackend, HwResult,
};
use hwsync_types::{IpAddress, RouterId};
use thiserror::Error;

/// Errors from verification lookups.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    /// No route with exactly this prefix is programmed.
    #[error("no route programmed for {ip}/{prefix_len} in {router}")]
    RouteNotFound {
        ip: IpAddress,
        prefix_len: u8,
        router: RouterId,
    },
}

/// Reads one ECMP group's membership as a multiset of egress ids.
///
/// On weight-aware hardware a member with weight n contributes n entries; on
/// legacy hardware the flat egress-id array is counted directly. Both forms
/// compare with `==`.
pub fn ecmp_group_in_hw(
    hw: &dyn HwBackend,
    group: EcmpGroupId,
    size_in_sw: usize,
) -> HwResult<EgressMultiset> {
    let mut group_in_hw = EgressMultiset::new();
    if hw.platform().supports(AsicFeature::ExtendedEcmpApi) {
        for member in hw.ecmp_group_members(group, size_in_sw)? {
            *group_in_hw.entry(member.egress_id).or_insert(0) += member.weight as usize;
        }
    } else {
        for egress_id in hw.ecmp_group_egress_ids(group, size_in_sw)? {
            *group_in_hw.entry(egress_id).or_insert(0) += 1;
        }
    }
    Ok(group_in_hw)
}

/// Total number of paths (weight included) the hardware holds for a group.
pub fn ecmp_size_in_hw(
    hw: &dyn HwBackend,
    group: EcmpGroupId,
    size_in_sw: usize,
) -> HwResult<usize> {
    Ok(ecmp_group_in_hw(hw, group, size_in_sw)?.values().sum())
}

/// All ECMP group ids currently programmed.
pub fn ecmp_groups_in_hw(hw: &dyn HwBackend) -> Vec<EcmpGroupId> {
    walk_ecmp(hw, false).0
}

/// All ECMP member egress ids currently programmed, flattened across groups
/// (weights expanded).
pub fn ecmp_members_in_hw(hw: &dyn HwBackend) -> Vec<EgressId> {
    walk_ecmp(hw, true).1
}

/// One capability-gated traversal serving both the group-id and member-id
/// queries; `collect_members` selects which side is accumulated.
fn walk_ecmp(hw: &dyn HwBackend, collect_members: bool) -> (Vec<EcmpGroupId>, Vec<EgressId>) {
    let mut groups = Vec::new();
    let mut members = Vec::new();
    if hw.platform().supports(AsicFeature::ExtendedEcmpApi) {
        hw.traverse_ecmp(&mut |group, group_members| {
            if collect_members {
                for member in group_members {
                    for _ in 0..member.weight {
                        members.push(member.egress_id);
                    }
                }
            } else {
                groups.push(group);
            }
        });
    } else {
        hw.traverse_ecmp_legacy(&mut |group, egress_ids| {
            if collect_members {
                members.extend_from_slice(egress_ids);
            } else {
                groups.push(group);
            }
        });
    }
    (groups, members)
}

/// Resolves the egress handle the hardware uses for an exact prefix in the
/// given virtual router.
///
/// # Errors
///
/// `RouteNotFound` if no route with exactly this prefix is programmed.
pub fn egress_id_for_route(
    hw: &dyn HwBackend,
    ip: IpAddress,
    prefix_len: u8,
    router: RouterId,
) -> Result<EgressId, VerifyError> {
    hw.egress_id_for_route(ip, prefix_len, router)
        .ok_or(VerifyError::RouteNotFound {
            ip,
            prefix_len,
            router,
        })
}
