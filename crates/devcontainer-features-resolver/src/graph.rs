//! C7: the dependency graph builder (§4.7).
//!
//! Nodes live in an arena (`Vec<GraphNode>`, edges as indices) rather
//! than an owned tree, grounded on `wasm-pkg-core`'s
//! `DependencyResolutionMap`/`IndexMap` pattern for deterministic-order
//! accumulation — the arena sidesteps the ownership cycles a
//! dependency graph would otherwise require reference counting for.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use devcontainer_features_common::digest::ContentDigest;
use devcontainer_features_common::feature_set::FeatureSet;
use devcontainer_features_common::identifier::{parse_identifier, SourceDescriptor};
use devcontainer_features_common::option_value::OptionsMap;
use devcontainer_features_common::Result;
use indexmap::IndexSet;

use crate::source::FeatureResolver;

pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    User,
    Override,
    Resolved,
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub kind: NodeKind,
    pub user_id: String,
    pub source: SourceDescriptor,
    pub options: OptionsMap,
    pub feature_set: Option<FeatureSet>,
    pub depends_on: Vec<NodeId>,
    pub installs_after: Vec<NodeId>,
    pub legacy_id_aliases: Option<BTreeSet<String>>,
    pub round_priority: i64,
}

impl GraphNode {
    fn seed(kind: NodeKind, user_id: String, source: SourceDescriptor, options: OptionsMap) -> Self {
        Self {
            kind,
            user_id,
            source,
            options,
            feature_set: None,
            depends_on: Vec::new(),
            installs_after: Vec::new(),
            legacy_id_aliases: None,
            round_priority: 0,
        }
    }
}

pub struct BuildResult {
    pub arena: Vec<GraphNode>,
    /// Dependency-capable nodes, in the order they were accumulated.
    pub accumulator: Vec<NodeId>,
    /// Nodes whose source kind is not dependency-capable.
    pub legacy: Vec<NodeId>,
}

/// Builds the dependency graph for a set of user-supplied Feature
/// identifiers (§4.7). `override_install_order` raises the round
/// priority of nodes matched by the soft-dependency rule.
pub async fn build_graph(
    resolver: &dyn FeatureResolver,
    inputs: Vec<(String, OptionsMap)>,
    override_install_order: &[String],
) -> Result<BuildResult> {
    let mut arena: Vec<GraphNode> = Vec::new();
    let mut worklist: VecDeque<NodeId> = VecDeque::new();
    let mut accumulator: IndexSet<NodeId> = IndexSet::new();
    let mut legacy: Vec<NodeId> = Vec::new();

    for (user_id, options) in inputs {
        let source = parse_identifier(&user_id)?;
        let node = GraphNode::seed(NodeKind::User, user_id, source, options);
        let id = arena.len();
        arena.push(node);
        worklist.push_back(id);
    }

    while let Some(current_id) = worklist.pop_front() {
        let source = arena[current_id].source.clone();
        let options = arena[current_id].options.clone();
        let feature_set = resolver
            .resolve(&source, &options)
            .await?
            .with_user_id(arena[current_id].user_id.clone());
        arena[current_id].feature_set = Some(feature_set);

        if !source.is_dependency_capable() {
            legacy.push(current_id);
            continue;
        }

        if accumulator.iter().any(|&id| nodes_equal(&arena[id], &arena[current_id])) {
            continue;
        }

        let metadata = arena[current_id]
            .feature_set
            .as_ref()
            .expect("feature_set was just attached")
            .metadata
            .clone();

        if let Some(depends_on) = &metadata.depends_on {
            for (user_feature_id, child_options) in depends_on {
                let child_source = parse_identifier(user_feature_id)?;
                let child = GraphNode::seed(
                    NodeKind::Resolved,
                    user_feature_id.clone(),
                    child_source,
                    child_options.clone(),
                );
                let child_id = arena.len();
                arena.push(child);
                arena[current_id].depends_on.push(child_id);
                worklist.push_back(child_id);
            }
        }

        if let Some(installs_after) = &metadata.installs_after {
            for user_feature_id in installs_after {
                let child_source = parse_identifier(user_feature_id)?;
                let child_options = OptionsMap::new();
                let child_feature_set = resolver
                    .resolve(&child_source, &child_options)
                    .await?
                    .with_user_id(user_feature_id.clone());
                let legacy_id_aliases = if matches!(child_source, SourceDescriptor::Oci { .. }) {
                    Some(child_feature_set.metadata.legacy_id_aliases())
                } else {
                    None
                };
                let mut child =
                    GraphNode::seed(NodeKind::Resolved, user_feature_id.clone(), child_source, child_options);
                child.feature_set = Some(child_feature_set);
                child.legacy_id_aliases = legacy_id_aliases;
                let child_id = arena.len();
                arena.push(child);
                arena[current_id].installs_after.push(child_id);
            }
        }

        accumulator.insert(current_id);
    }

    apply_override_install_order(resolver, &mut arena, &accumulator, &mut legacy, override_install_order).await?;

    Ok(BuildResult {
        arena,
        accumulator: accumulator.into_iter().collect(),
        legacy,
    })
}

/// §4.7 step 3: the last identifier in `override_install_order` receives
/// priority 1, the first receives priority N.
async fn apply_override_install_order(
    resolver: &dyn FeatureResolver,
    arena: &mut Vec<GraphNode>,
    accumulator: &IndexSet<NodeId>,
    legacy: &mut Vec<NodeId>,
    override_install_order: &[String],
) -> Result<()> {
    let n = override_install_order.len();
    for (i, user_id) in override_install_order.iter().enumerate() {
        let assigned_priority = (n - i) as i64;
        let source = parse_identifier(user_id)?;
        let feature_set = resolver
            .resolve(&source, &OptionsMap::new())
            .await?
            .with_user_id(user_id.clone());

        if !source.is_dependency_capable() {
            let mut node = GraphNode::seed(NodeKind::Override, user_id.clone(), source, OptionsMap::new());
            node.feature_set = Some(feature_set);
            let id = arena.len();
            arena.push(node);
            legacy.push(id);
            continue;
        }

        let legacy_id_aliases = Some(feature_set.metadata.legacy_id_aliases());
        let mut override_node = GraphNode::seed(NodeKind::Override, user_id.clone(), source, OptionsMap::new());
        override_node.feature_set = Some(feature_set);
        override_node.legacy_id_aliases = legacy_id_aliases;

        for &node_id in accumulator {
            if soft_dependency_match(&arena[node_id], &override_node) {
                arena[node_id].round_priority = arena[node_id].round_priority.max(assigned_priority);
            }
        }
    }
    Ok(())
}

/// §4.7 node equality.
pub(crate) fn nodes_equal(a: &GraphNode, b: &GraphNode) -> bool {
    match (&a.source, &b.source) {
        (SourceDescriptor::Oci { resource: ra, .. }, SourceDescriptor::Oci { resource: rb, .. }) => {
            ra == rb && manifest_digest(a) == manifest_digest(b) && a.options == b.options
        }
        (SourceDescriptor::FilePath { path: pa, .. }, SourceDescriptor::FilePath { path: pb, .. }) => {
            pa == pb && a.options == b.options
        }
        _ => false,
    }
}

/// §4.7 soft-dependency match: does `node` satisfy `soft_dep`?
pub(crate) fn soft_dependency_match(node: &GraphNode, soft_dep: &GraphNode) -> bool {
    if !node.source.is_dependency_capable() || !soft_dep.source.is_dependency_capable() {
        return false;
    }
    match (&node.source, &soft_dep.source) {
        (
            SourceDescriptor::Oci { resource: node_resource, .. },
            SourceDescriptor::Oci {
                registry,
                namespace,
                resource: dep_resource,
                ..
            },
        ) => {
            if node_resource == dep_resource {
                return true;
            }
            match &soft_dep.legacy_id_aliases {
                Some(aliases) => aliases.iter().any(|alias| {
                    let candidate = match namespace {
                        Some(ns) => format!("{registry}/{}/{alias}", ns.as_str()),
                        None => format!("{registry}/{alias}"),
                    };
                    &candidate == node_resource
                }),
                None => false,
            }
        }
        (SourceDescriptor::FilePath { path: pa, .. }, SourceDescriptor::FilePath { path: pb, .. }) => pa == pb,
        _ => false,
    }
}

pub(crate) fn manifest_digest(node: &GraphNode) -> Option<ContentDigest> {
    node.feature_set.as_ref().and_then(|f| f.manifest_digest.clone())
}
