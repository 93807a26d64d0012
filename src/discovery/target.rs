//! Target groups and Lightsail meta-labels.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::discovery::Instance;

/// Prefix of every group source.
pub const SOURCE_PREFIX: &str = "lightsail";

/// Value of the public IP label when the instance has no public address.
pub const PUBLIC_IP_MISSING: &str = "null";

/// Label names attached to every Lightsail target group.
pub mod labels {
    pub const ADDRESS: &str = "__address__";

    pub const AVAILABILITY_ZONE: &str = "__meta_lightsail_availability_zone";
    pub const BLUEPRINT_ID: &str = "__meta_lightsail_blueprint_id";
    pub const BUNDLE_ID: &str = "__meta_lightsail_bundle_id";
    pub const INSTANCE_ID: &str = "__meta_lightsail_instance_id";
    pub const NAME: &str = "__meta_lightsail_name";
    pub const PRIVATE_IP: &str = "__meta_lightsail_private_ip";
    pub const PUBLIC_IP: &str = "__meta_lightsail_public_ip";
    pub const STATE: &str = "__meta_lightsail_state";
    pub const SUPPORT_CODE: &str = "__meta_lightsail_support_code";
    /// Prefix for tag labels; the sanitized tag key is appended.
    pub const TAG_PREFIX: &str = "__meta_lightsail_tag_";
}

/// A set of targets sharing the same labels.
///
/// `source` identifies the group across polls and is never written to the
/// output file. A group with empty `targets` and `labels` is a tombstone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetGroup {
    pub source: String,
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    /// Build the group describing `instance`.
    pub fn from_instance(instance: &Instance) -> Self {
        let public_ip = instance.public_ip.as_deref().unwrap_or(PUBLIC_IP_MISSING);

        let mut group_labels: BTreeMap<String, String> = [
            (labels::ADDRESS, instance.private_ip.as_str()),
            (labels::AVAILABILITY_ZONE, instance.availability_zone.as_str()),
            (labels::BLUEPRINT_ID, instance.blueprint_id.as_str()),
            (labels::BUNDLE_ID, instance.bundle_id.as_str()),
            (labels::INSTANCE_ID, instance_id(&instance.support_code)),
            (labels::NAME, instance.name.as_str()),
            (labels::PRIVATE_IP, instance.private_ip.as_str()),
            (labels::PUBLIC_IP, public_ip),
            (labels::STATE, instance.state.as_str()),
            (labels::SUPPORT_CODE, instance.support_code.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        // Later tags overwrite earlier ones that sanitize to the same name.
        for (key, value) in &instance.tags {
            let name = format!("{}{}", labels::TAG_PREFIX, sanitize_label_name(key));
            group_labels.insert(name, value.clone());
        }

        Self {
            source: source_for(&instance.name),
            targets: vec![instance.private_ip.clone()],
            labels: group_labels,
        }
    }

    /// Create a tombstone for `source`.
    pub fn tombstone(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Whether this group only signals removal of its source.
    pub fn is_tombstone(&self) -> bool {
        self.targets.is_empty() && self.labels.is_empty()
    }
}

/// Stable source identifier for an instance name.
fn source_for(name: &str) -> String {
    format!("{SOURCE_PREFIX}/{name}")
}

/// Instance id from a support code of the form `<account>/<instance-id>`.
///
/// Returns an empty string when the code has no `/`.
fn instance_id(support_code: &str) -> &str {
    support_code.split('/').nth(1).unwrap_or_default()
}

/// Replace every character that is not valid in a label name with `_`.
pub fn sanitize_label_name(name: &str) -> String {
    static INVALID_LABEL_CHARS: OnceLock<Regex> = OnceLock::new();

    let regex = INVALID_LABEL_CHARS
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]").expect("failed to compile label regex"));

    regex.replace_all(name, "_").into_owned()
}
