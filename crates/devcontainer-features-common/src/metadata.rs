//! `devcontainer-feature.json` metadata types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::option_value::OptionValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSpec {
    #[serde(flatten)]
    pub kind: OptionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    Boolean {
        #[serde(default)]
        default: bool,
    },
    String {
        #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
        #[serde(default)]
        default: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LifecycleHookCommand {
    Single(String),
    Multiple(Vec<String>),
    Labeled(BTreeMap<String, LifecycleHookCommandValue>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LifecycleHookCommandValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Parsed `devcontainer-feature.json` metadata (§3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounts: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_add: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_opt: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installs_after: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<BTreeMap<String, BTreeMap<String, OptionValue>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, OptionSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_hooks: Option<BTreeMap<String, LifecycleHookCommand>>,
}

impl FeatureMetadata {
    /// A Feature predates the dependency mechanism (is "legacy") if it
    /// declares neither `dependsOn` nor `installsAfter`. This alone does
    /// not make a *source* legacy (source kind decides that per §4.7) but
    /// it does decide whether legacy id aliases apply.
    pub fn legacy_id_aliases(&self) -> BTreeSet<String> {
        let mut aliases: BTreeSet<String> = self.legacy_ids.clone().unwrap_or_default().into_iter().collect();
        aliases.insert(self.id.clone());
        aliases
    }

    pub fn parse(contents: &str, identifier: &str) -> crate::Result<Self> {
        let stripped = strip_jsonc_comments(contents);
        serde_json::from_str(&stripped).map_err(|e| crate::Error::MetadataParseError {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Strips `//` and `/* */` comments from JSONC, respecting string
/// literals so that URLs containing `//` are not mistaken for comments.
fn strip_jsonc_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            other => out.push(other),
        }
    }
    out
}
