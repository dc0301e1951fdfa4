//! C8: the round-based install scheduler (§4.8) and the legacy
//! topological pass (§4.8.1), grounded on `wasm-pkg-core::resolver`'s
//! `visit`/`IndexSet`/`HashSet` DFS cycle-detection triad, adapted from
//! foreign-package cycles to `installsAfter` legacy-alias matching.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use devcontainer_features_common::feature_set::FeatureSet;
use devcontainer_features_common::{Error, Result};

use crate::graph::{manifest_digest, nodes_equal, soft_dependency_match, BuildResult, GraphNode, NodeId};

/// Runs the full scheduler (soft-edge pruning, round loop, legacy pass)
/// and returns the ordered `FeatureSet`s (§4.8).
pub fn schedule(mut build: BuildResult, override_install_order: &[String]) -> Result<Vec<FeatureSet>> {
    prune_dangling_soft_edges(&mut build.arena, &build.accumulator);

    let mut installed: Vec<NodeId> = Vec::new();
    let mut remaining: Vec<NodeId> = build.accumulator.clone();
    let mut round_output: Vec<NodeId> = Vec::new();

    while !remaining.is_empty() {
        let eligible: Vec<NodeId> = remaining
            .iter()
            .copied()
            .filter(|&id| is_eligible(&build.arena, id, &installed))
            .collect();

        if eligible.is_empty() {
            let nodes = remaining.iter().map(|&id| build.arena[id].user_id.clone()).collect();
            return Err(Error::CyclicDependency { nodes });
        }

        let max_priority = eligible.iter().map(|&id| build.arena[id].round_priority).max().unwrap();
        let mut round: Vec<NodeId> = eligible
            .into_iter()
            .filter(|&id| build.arena[id].round_priority == max_priority)
            .collect();
        round.sort_by(|&a, &b| compares_to(&build.arena[a], &build.arena[b]));

        for &id in &round {
            installed.push(id);
            round_output.push(id);
        }
        remaining.retain(|id| !round.contains(id));
    }

    let legacy_order = legacy_ordering(&build.arena, &build.legacy, override_install_order)?;

    let mut ordered_ids = legacy_order;
    ordered_ids.extend(round_output);

    Ok(ordered_ids
        .into_iter()
        .map(|id| {
            build.arena[id]
                .feature_set
                .clone()
                .expect("every scheduled node was resolved during graph construction")
        })
        .collect())
}

/// §4.8 step 1: drop `installsAfter` entries no worklist node satisfies.
fn prune_dangling_soft_edges(arena: &mut [GraphNode], accumulator: &[NodeId]) {
    for &id in accumulator {
        let installs_after = arena[id].installs_after.clone();
        let kept: Vec<NodeId> = installs_after
            .into_iter()
            .filter(|&target_id| accumulator.iter().any(|&other_id| soft_dependency_match(&arena[other_id], &arena[target_id])))
            .collect();
        arena[id].installs_after = kept;
    }
}

/// §4.8 step 2a: no outstanding hard child, and every remaining soft
/// dependency has an installed predecessor (or the node has no edges
/// at all).
fn is_eligible(arena: &[GraphNode], id: NodeId, installed: &[NodeId]) -> bool {
    let node = &arena[id];
    if node.depends_on.is_empty() && node.installs_after.is_empty() {
        return true;
    }
    let hard_ok = node
        .depends_on
        .iter()
        .all(|&child_id| installed.iter().any(|&inst| nodes_equal(&arena[inst], &arena[child_id])));
    let soft_ok = node
        .installs_after
        .iter()
        .all(|&target_id| installed.iter().any(|&inst| soft_dependency_match(&arena[inst], &arena[target_id])));
    hard_ok && soft_ok
}

/// §4.8 step 2d: the total order over eligible nodes within a round.
fn compares_to(a: &GraphNode, b: &GraphNode) -> Ordering {
    use devcontainer_features_common::identifier::SourceDescriptor::*;
    match (&a.source, &b.source) {
        (Oci { resource: ra, reference: ta, .. }, Oci { resource: rb, reference: tb, .. }) => ra
            .cmp(rb)
            .then_with(|| ta.as_str().cmp(tb.as_str()))
            .then_with(|| a.options.cmp(&b.options))
            .then_with(|| manifest_digest(a).cmp(&manifest_digest(b))),
        (FilePath { path: pa, .. }, FilePath { path: pb, .. }) => pa.cmp(pb).then_with(|| a.options.cmp(&b.options)),
        _ => a.user_id.cmp(&b.user_id),
    }
}

/// §4.8.1: topologically order the legacy list by `installsAfter`
/// adjacency (matched against name, legacy alias, or current id),
/// breadth-first with lexicographic tie-breaking per wave. Decision
/// recorded in `DESIGN.md`: a dangling target (matching no legacy
/// Feature) is treated as already satisfied, mirroring the original
/// engine's behavior rather than the newer engine's pruning.
fn legacy_ordering(arena: &[GraphNode], legacy: &[NodeId], override_install_order: &[String]) -> Result<Vec<NodeId>> {
    let mut name_to_id: HashMap<String, NodeId> = HashMap::new();
    for &id in legacy {
        if let Some(feature_set) = &arena[id].feature_set {
            for alias in feature_set.metadata.legacy_id_aliases() {
                name_to_id.entry(alias).or_insert(id);
            }
            if let Some(current_id) = &feature_set.metadata.current_id {
                name_to_id.entry(current_id.clone()).or_insert(id);
            }
        }
        name_to_id.entry(arena[id].user_id.clone()).or_insert(id);
    }

    let mut indegree: HashMap<NodeId, usize> = legacy.iter().map(|&id| (id, 0)).collect();
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &id in legacy {
        if let Some(feature_set) = &arena[id].feature_set {
            if let Some(installs_after) = &feature_set.metadata.installs_after {
                for target_name in installs_after {
                    if let Some(&target_id) = name_to_id.get(target_name) {
                        if target_id == id {
                            continue;
                        }
                        *indegree.get_mut(&id).expect("id seeded above") += 1;
                        dependents.entry(target_id).or_default().push(id);
                    }
                }
            }
        }
    }

    let mut order: Vec<NodeId> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut wave: Vec<NodeId> = legacy.iter().copied().filter(|id| indegree[id] == 0).collect();
    wave.sort_by_key(|&id| arena[id].user_id.clone());

    while !wave.is_empty() {
        let mut next_wave: Vec<NodeId> = Vec::new();
        for &id in &wave {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(deps) = dependents.get(&id) {
                for &dep_id in deps {
                    let entry = indegree.get_mut(&dep_id).expect("dependent id seeded above");
                    *entry -= 1;
                    if *entry == 0 {
                        next_wave.push(dep_id);
                    }
                }
            }
        }
        next_wave.sort_by_key(|&id| arena[id].user_id.clone());
        wave = next_wave;
    }

    if order.len() != legacy.len() {
        let nodes = legacy
            .iter()
            .filter(|id| !seen.contains(id))
            .map(|&id| arena[id].user_id.clone())
            .collect();
        return Err(Error::CyclicDependency { nodes });
    }

    if override_install_order.is_empty() {
        return Ok(order);
    }

    let mut head: Vec<NodeId> = Vec::new();
    for name in override_install_order {
        if let Some(&id) = name_to_id.get(name) {
            if legacy.contains(&id) && !head.contains(&id) {
                head.push(id);
            }
        }
    }
    let mut tail: Vec<NodeId> = order.into_iter().filter(|id| !head.contains(id)).collect();
    let mut result = head;
    result.append(&mut tail);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use devcontainer_features_common::identifier::SourceDescriptor;
    use devcontainer_features_common::metadata::FeatureMetadata;
    use devcontainer_features_common::option_value::OptionsMap;

    use super::*;
    use crate::graph::NodeKind;

    fn legacy_node(user_id: &str, installs_after: Option<std::collections::BTreeSet<String>>) -> GraphNode {
        GraphNode {
            kind: NodeKind::User,
            user_id: user_id.to_string(),
            source: SourceDescriptor::GitHubRelease {
                owner: "octocat".into(),
                repo: "features".into(),
                name: user_id.to_string(),
                tag: "latest".into(),
            },
            options: OptionsMap::new(),
            feature_set: Some(FeatureSet::new(
                SourceDescriptor::GitHubRelease {
                    owner: "octocat".into(),
                    repo: "features".into(),
                    name: user_id.to_string(),
                    tag: "latest".into(),
                },
                FeatureMetadata {
                    id: user_id.to_string(),
                    installs_after,
                    ..Default::default()
                },
                OptionsMap::new(),
            )),
            depends_on: Vec::new(),
            installs_after: Vec::new(),
            legacy_id_aliases: None,
            round_priority: 0,
        }
    }

    #[test]
    fn legacy_pass_orders_by_installs_after() {
        let mut first_after = std::collections::BTreeSet::new();
        first_after.insert("base".to_string());
        let arena = vec![legacy_node("base", None), legacy_node("first", Some(first_after))];
        let order = legacy_ordering(&arena, &[0, 1], &[]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn legacy_pass_detects_cycle() {
        let mut a_after = std::collections::BTreeSet::new();
        a_after.insert("b".to_string());
        let mut b_after = std::collections::BTreeSet::new();
        b_after.insert("a".to_string());
        let arena = vec![legacy_node("a", Some(a_after)), legacy_node("b", Some(b_after))];
        let err = legacy_ordering(&arena, &[0, 1], &[]).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn override_install_order_moves_named_nodes_first() {
        let arena = vec![legacy_node("base", None), legacy_node("other", None)];
        let order = legacy_ordering(&arena, &[0, 1], &["other".to_string()]).unwrap();
        assert_eq!(order, vec![1, 0]);
    }
}
