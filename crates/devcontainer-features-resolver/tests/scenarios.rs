//! Integration coverage for the concrete scheduler scenarios.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use devcontainer_features_common::digest::ContentDigest;
use devcontainer_features_common::feature_set::FeatureSet;
use devcontainer_features_common::identifier::SourceDescriptor;
use devcontainer_features_common::manifest::{OciDescriptor, OciManifest, DEVCONTAINER_CONFIG_MEDIA_TYPE, MANIFEST_MEDIA_TYPE};
use devcontainer_features_common::metadata::FeatureMetadata;
use devcontainer_features_common::option_value::OptionsMap;
use devcontainer_features_common::{Error, Result};
use devcontainer_features_resolver::{build_graph, schedule, FeatureResolver};

struct ScriptedResolver {
    metadata_by_resource: HashMap<String, FeatureMetadata>,
    fixed_digest: Option<ContentDigest>,
}

fn oci_resource(source: &SourceDescriptor) -> String {
    match source {
        SourceDescriptor::Oci { resource, .. } => resource.clone(),
        SourceDescriptor::GitHubRelease { owner, repo, name, .. } => format!("{owner}/{repo}/{name}"),
        SourceDescriptor::FilePath { path, .. } => path.clone(),
        SourceDescriptor::Tarball { url, .. } => url.clone(),
        SourceDescriptor::Local { name } => name.clone(),
    }
}

fn stub_manifest() -> OciManifest {
    OciManifest {
        schema_version: 2,
        media_type: MANIFEST_MEDIA_TYPE.to_string(),
        config: OciDescriptor {
            media_type: DEVCONTAINER_CONFIG_MEDIA_TYPE.to_string(),
            digest: "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string(),
            size: 0,
            annotations: None,
        },
        layers: Vec::new(),
        annotations: None,
    }
}

#[async_trait]
impl FeatureResolver for ScriptedResolver {
    async fn resolve(&self, source: &SourceDescriptor, options: &OptionsMap) -> Result<FeatureSet> {
        let resource = oci_resource(source);
        let metadata = self.metadata_by_resource.get(&resource).cloned().ok_or_else(|| Error::DependencyUnresolved {
            identifier: resource.clone(),
            dependency: resource.clone(),
            reason: "no scripted metadata for this resource".into(),
        })?;
        let mut feature_set = FeatureSet::new(source.clone(), metadata, options.clone());
        if let Some(digest) = &self.fixed_digest {
            feature_set = feature_set.with_manifest(stub_manifest(), digest.clone());
        }
        Ok(feature_set)
    }
}

fn depends_on_experiment(name: &str) -> String {
    format!("ghcr.io/codspace/dependsonexperiment/{name}")
}

/// S2: A dependsOn B, B independent -> plan [B, A].
#[tokio::test]
async fn s2_hard_dependency_orders_dependency_before_dependent() {
    let a = depends_on_experiment("a");
    let b = depends_on_experiment("b");

    let mut depends_on = BTreeMap::new();
    depends_on.insert(b.clone(), OptionsMap::new());
    let mut metadata_by_resource = HashMap::new();
    metadata_by_resource.insert(
        a.clone(),
        FeatureMetadata { id: "a".into(), depends_on: Some(depends_on), ..Default::default() },
    );
    metadata_by_resource.insert(b.clone(), FeatureMetadata { id: "b".into(), ..Default::default() });

    let resolver = ScriptedResolver { metadata_by_resource, fixed_digest: None };
    let build = build_graph(&resolver, vec![(a.clone(), OptionsMap::new()), (b.clone(), OptionsMap::new())], &[])
        .await
        .unwrap();
    let plan = schedule(build, &[]).unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].metadata.id, "b");
    assert_eq!(plan[1].metadata.id, "a");
}

/// S3: A dependsOn B and B dependsOn A -> CyclicDependency.
#[tokio::test]
async fn s3_mutual_hard_dependency_is_cyclic() {
    let a = depends_on_experiment("a");
    let b = depends_on_experiment("b");

    let mut a_depends_on = BTreeMap::new();
    a_depends_on.insert(b.clone(), OptionsMap::new());
    let mut b_depends_on = BTreeMap::new();
    b_depends_on.insert(a.clone(), OptionsMap::new());

    let mut metadata_by_resource = HashMap::new();
    metadata_by_resource.insert(
        a.clone(),
        FeatureMetadata { id: "a".into(), depends_on: Some(a_depends_on), ..Default::default() },
    );
    metadata_by_resource.insert(
        b.clone(),
        FeatureMetadata { id: "b".into(), depends_on: Some(b_depends_on), ..Default::default() },
    );

    let resolver = ScriptedResolver { metadata_by_resource, fixed_digest: None };
    let build = build_graph(&resolver, vec![(a.clone(), OptionsMap::new()), (b.clone(), OptionsMap::new())], &[])
        .await
        .unwrap();
    let err = schedule(build, &[]).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}

/// S4: overrideInstallOrder = ["C", "A"] over {A, B, C, D} where A, C have
/// no hard deps and B, D depend on A -> [C, A, B, D].
#[tokio::test]
async fn s4_override_install_order_raises_round_priority() {
    let prefix = "ghcr.io/codspace/overridetest";
    let a = format!("{prefix}/a");
    let b = format!("{prefix}/b");
    let c = format!("{prefix}/c");
    let d = format!("{prefix}/d");

    let mut b_depends_on = BTreeMap::new();
    b_depends_on.insert(a.clone(), OptionsMap::new());
    let mut d_depends_on = BTreeMap::new();
    d_depends_on.insert(a.clone(), OptionsMap::new());

    let mut metadata_by_resource = HashMap::new();
    metadata_by_resource.insert(a.clone(), FeatureMetadata { id: "a".into(), ..Default::default() });
    metadata_by_resource.insert(
        b.clone(),
        FeatureMetadata { id: "b".into(), depends_on: Some(b_depends_on), ..Default::default() },
    );
    metadata_by_resource.insert(c.clone(), FeatureMetadata { id: "c".into(), ..Default::default() });
    metadata_by_resource.insert(
        d.clone(),
        FeatureMetadata { id: "d".into(), depends_on: Some(d_depends_on), ..Default::default() },
    );

    let resolver = ScriptedResolver { metadata_by_resource, fixed_digest: None };
    let inputs = vec![
        (a.clone(), OptionsMap::new()),
        (b.clone(), OptionsMap::new()),
        (c.clone(), OptionsMap::new()),
        (d.clone(), OptionsMap::new()),
    ];
    let override_install_order = vec![c.clone(), a.clone()];
    let build = build_graph(&resolver, inputs, &override_install_order).await.unwrap();
    let plan = schedule(build, &override_install_order).unwrap();

    let ids: Vec<String> = plan.iter().map(|f| f.metadata.id.clone()).collect();
    assert_eq!(ids, vec!["c", "a", "b", "d"]);
}

/// S5: two OCI refs, same resource@digest, different options stay
/// distinct and order by option comparison; identical options collapse.
#[tokio::test]
async fn s5_option_differences_keep_nodes_distinct() {
    let resource = "ghcr.io/devcontainers/features/common-utils".to_string();
    let mut metadata_by_resource = HashMap::new();
    metadata_by_resource.insert(resource.clone(), FeatureMetadata { id: "common-utils".into(), ..Default::default() });

    let resolver = ScriptedResolver {
        metadata_by_resource,
        fixed_digest: Some(ContentDigest::sha256(b"fixed")),
    };

    let mut options_a = OptionsMap::new();
    options_a.insert("username".to_string(), devcontainer_features_common::option_value::OptionValue::String("alice".into()));
    let mut options_b = OptionsMap::new();
    options_b.insert("username".to_string(), devcontainer_features_common::option_value::OptionValue::String("bob".into()));

    let build = build_graph(
        &resolver,
        vec![(resource.clone(), options_a), (resource.clone(), options_b)],
        &[],
    )
    .await
    .unwrap();
    let plan = schedule(build, &[]).unwrap();
    assert_eq!(plan.len(), 2);

    let build_same = build_graph(
        &resolver,
        vec![(resource.clone(), OptionsMap::new()), (resource.clone(), OptionsMap::new())],
        &[],
    )
    .await
    .unwrap();
    let plan_same = schedule(build_same, &[]).unwrap();
    assert_eq!(plan_same.len(), 1);
}
