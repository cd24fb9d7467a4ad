// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Boot payload rendering.

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::launch_config::LaunchConfig;

/// First line of a cloud-init cloud-config document.
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// Renders the user-data payload an instance receives at boot.
///
/// Rendering must be deterministic: the same configuration yields the same bytes.
pub trait BootPayloadRenderer: Send + Sync {
    /// Render the payload for `config`.
    fn render(&self, config: &LaunchConfig) -> Result<Vec<u8>>;
}

/// Renders the configuration's `cloud_config` mapping as a cloud-config document.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudConfigRenderer;

impl BootPayloadRenderer for CloudConfigRenderer {
    fn render(&self, config: &LaunchConfig) -> Result<Vec<u8>> {
        let document = match config.cloud_config() {
            Some(value) => value.clone(),
            None => Value::Mapping(Mapping::new()),
        };

        let body = serde_yaml::to_string(&document)?;
        Ok(format!("{CLOUD_CONFIG_HEADER}\n{body}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_cloud_config() {
        let payload = CloudConfigRenderer
            .render(&LaunchConfig::new().with("container_name", "web1"))
            .unwrap();

        assert_eq!(payload, b"#cloud-config\n{}\n");
    }

    #[test]
    fn test_render_cloud_config_section() {
        let config = LaunchConfig::from_yaml_str(
            r#"
container_name: web1
cloud_config:
  packages:
    - nginx
"#,
        )
        .unwrap();

        let payload = String::from_utf8(CloudConfigRenderer.render(&config).unwrap()).unwrap();

        assert!(payload.starts_with("#cloud-config\n"));
        assert!(payload.contains("- nginx"));
        assert!(!payload.contains("container_name"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = LaunchConfig::from_yaml_str("cloud_config: {b: 1, a: 2}").unwrap();

        assert_eq!(
            CloudConfigRenderer.render(&config).unwrap(),
            CloudConfigRenderer.render(&config).unwrap()
        );
    }
}
