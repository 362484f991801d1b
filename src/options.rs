use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::admission::{AdmissionOptions, AdmissionPlugin};
use crate::enforcer::ReadDenial;
use crate::error::ClaimError;

/// Where virtual workspaces are served unless configured otherwise.
pub const DEFAULT_ROOT_PATH_PREFIX: &str = "/services/";

static DNS1123_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

/// Is `name` usable as a virtual workspace name (a DNS-1123 label)?
pub fn is_dns1123_label(name: &str) -> bool {
    name.len() <= 63 && DNS1123_LABEL.is_match(name)
}

/// Configuration for the virtual workspace layer.
///
/// Loaded from JSON by embedders; every field has a default, so `{}` is a
/// complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualOptions {
    pub enabled: bool,
    /// Path under which virtual workspaces are mounted. Must start and end
    /// with `/`.
    pub root_path_prefix: String,
    pub read_denial: ReadDenial,
    pub admission: AdmissionOptions,
}

impl Default for VirtualOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            root_path_prefix: DEFAULT_ROOT_PATH_PREFIX.to_string(),
            read_denial: ReadDenial::default(),
            admission: AdmissionOptions::default(),
        }
    }
}

impl VirtualOptions {
    pub fn from_json(raw: &str) -> Result<Self, ClaimError> {
        serde_json::from_str(raw).map_err(|e| ClaimError::InvalidFormat(e.to_string()))
    }

    /// Every problem with these options, checked against the plugins that
    /// are available. Empty means valid. Disabled options are not checked,
    /// since nothing is mounted from them.
    pub fn validate(&self, plugins: &[std::sync::Arc<dyn AdmissionPlugin>]) -> Vec<ClaimError> {
        let mut errs = Vec::new();
        if !self.enabled {
            return errs;
        }

        if !self.root_path_prefix.starts_with('/') || !self.root_path_prefix.ends_with('/') {
            errs.push(ClaimError::Config(format!(
                "root path prefix {:?} must start and end with '/'",
                self.root_path_prefix
            )));
        }
        errs.extend(self.admission.validate(plugins));

        for err in &errs {
            warn!(event = "Options", phase = "Validate", error = %err);
        }
        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{ClaimLabeler, ReservedLabels, builtin_plugins};
    use insta::assert_json_snapshot;
    use yare::parameterized;

    #[test]
    fn test_defaults() {
        let options = VirtualOptions::default();
        assert!(options.enabled);
        assert!(options.validate(&builtin_plugins()).is_empty());
        assert_json_snapshot!(options, @r#"
        {
          "enabled": true,
          "rootPathPrefix": "/services/",
          "readDenial": "notFound",
          "admission": {
            "pluginOrder": [
              "apis.claimview.io/PermissionClaims",
              "apis.claimview.io/ReservedLabels"
            ],
            "disablePlugins": []
          }
        }
        "#);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(VirtualOptions::from_json("{}").unwrap(), VirtualOptions::default());
    }

    #[test]
    fn test_from_json() {
        let raw = r#"{
            "readDenial": "forbidden",
            "admission": {
                "pluginOrder": ["apis.claimview.io/ReservedLabels", "apis.claimview.io/PermissionClaims"],
                "disablePlugins": ["apis.claimview.io/ReservedLabels"]
            }
        }"#;
        let options = VirtualOptions::from_json(raw).unwrap();
        assert_eq!(options.read_denial, ReadDenial::Forbidden);
        assert_eq!(options.admission.plugin_order[1], ClaimLabeler::NAME);
        assert_eq!(options.admission.disable_plugins, vec![ReservedLabels::NAME.to_string()]);
        assert!(options.validate(&builtin_plugins()).is_empty());
    }

    #[test]
    fn test_bad_json_is_invalid_format() {
        let err = VirtualOptions::from_json(r#"{"enabled": "yes"}"#).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let options = VirtualOptions {
            root_path_prefix: "services".to_string(),
            admission: AdmissionOptions {
                plugin_order: vec!["Unknown".to_string()],
                disable_plugins: vec![ClaimLabeler::NAME.to_string()],
            },
            ..Default::default()
        };
        assert_eq!(options.validate(&builtin_plugins()).len(), 3);
    }

    #[test]
    fn test_validate_skips_disabled() {
        let options = VirtualOptions {
            enabled: false,
            root_path_prefix: "services".to_string(),
            admission: AdmissionOptions {
                plugin_order: vec!["Unknown".to_string()],
                disable_plugins: Vec::new(),
            },
            ..Default::default()
        };
        assert!(options.validate(&builtin_plugins()).is_empty());
        assert_eq!(
            VirtualOptions { enabled: true, ..options }.validate(&builtin_plugins()).len(),
            2
        );
    }

    #[parameterized(
        simple = { "apiexport", true },
        dashed = { "initializing-workspaces", true },
        digits = { "ws1", true },
        upper = { "APIExport", false },
        leading_dash = { "-apiexport", false },
        trailing_dash = { "apiexport-", false },
        dotted = { "api.export", false },
        empty = { "", false },
    )]
    fn test_dns1123_label(name: &str, expected: bool) {
        assert_eq!(is_dns1123_label(name), expected);
    }

    #[test]
    fn test_dns1123_label_length() {
        assert!(is_dns1123_label(&"a".repeat(63)));
        assert!(!is_dns1123_label(&"a".repeat(64)));
    }
}
