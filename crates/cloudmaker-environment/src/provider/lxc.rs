// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! LXC container provider.
//!
//! Launches containers with the LXC command-line tools. State kept outside
//! LXC lives in the data directory:
//! - Seed: {DATA_DIR}/lxc/{instance_id}/seed/{user-data,meta-data}
//! - Record: {DATA_DIR}/lxc/{instance_id}/instance.yaml
//!
//! The seed directory is bind-mounted into ephemeral containers for
//! cloud-init's NoCloud data source. The record outlives the container:
//! `lxc-stop` destroys ephemeral clones, and the instance is still found
//! (as `terminated`) from its record afterwards.

use async_trait::async_trait;
use chrono::Utc;
use cloudmaker_archive::{InstanceProperties, LaunchConfig, PropertySpec, is_valid_instance_id};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::traits::*;
use crate::config::Config;

/// Scope name of the system default LXC path.
pub const DEFAULT_SCOPE: &str = "default";

const TERMINATED: &str = "terminated";

fn default_ephemeral() -> Value {
    Value::Bool(true)
}

/// Launch configuration properties the LXC provider relies on.
pub const LXC_CONFIG_SCHEMA: [PropertySpec; 2] = [
    PropertySpec::required("container_name", "The name of the lxc container (see lxc-ls)"),
    PropertySpec::required(
        "ephemeral",
        "Start a throwaway clone of the container instead of the container itself",
    )
    .with_default(default_ephemeral),
];

/// LXC provider configuration
#[derive(Debug, Clone)]
pub struct LxcProviderConfig {
    /// Directory for seeds and instance records
    pub data_dir: PathBuf,
    /// Additional LXC paths (`-P`) searched after the default one
    pub lxc_paths: Vec<String>,
    /// Directory holding the `lxc-*` tools; `None` resolves them on `PATH`
    pub tools_dir: Option<PathBuf>,
}

impl LxcProviderConfig {
    /// Derive the provider configuration from the environment configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.join("lxc"),
            lxc_paths: config.lxc_paths.clone(),
            tools_dir: config.lxc_tools_dir.clone(),
        }
    }
}

/// A row of `lxc-ls --fancy` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LxcContainer {
    /// Container name
    pub name: String,
    /// State (e.g., "RUNNING", "STOPPED")
    pub state: String,
    /// First IPv4 address, if any
    pub ipv4: Option<String>,
}

/// Parse `lxc-ls --fancy` output.
///
/// Columns are located from the header line, so extra columns (AUTOSTART,
/// GROUPS, ...) and multi-address IPV4 cells are handled.
pub fn parse_lxc_ls(output: &str) -> Vec<LxcContainer> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let columns = column_starts(header);
    let position = |name: &str| columns.iter().position(|(_, n)| *n == name);
    let (Some(name_col), Some(state_col)) = (position("NAME"), position("STATE")) else {
        return Vec::new();
    };
    let ipv4_col = position("IPV4");

    let cell = |line: &str, col: usize| -> String {
        let start = columns[col].0;
        let end = columns.get(col + 1).map(|(s, _)| *s).unwrap_or(line.len());
        line.get(start.min(line.len())..end.min(line.len()))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    lines
        .filter(|line| !line.trim_start().starts_with('-'))
        .filter_map(|line| {
            let name = cell(line, name_col);
            if name.is_empty() {
                return None;
            }
            let ipv4 = ipv4_col
                .map(|col| cell(line, col))
                .and_then(|ips| ips.split(',').next().map(|ip| ip.trim().to_string()))
                .filter(|ip| !ip.is_empty() && ip != "-");
            Some(LxcContainer {
                name,
                state: cell(line, state_col),
                ipv4,
            })
        })
        .collect()
}

fn column_starts(header: &str) -> Vec<(usize, &str)> {
    let mut columns = Vec::new();
    let mut start = None;
    for (i, c) in header.char_indices() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                columns.push((s, &header[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        columns.push((s, &header[s..]));
    }
    columns
}

/// Instance record persisted next to the seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceRecord {
    container: String,
    ephemeral: bool,
    scope: String,
    properties: InstanceProperties,
}


/// Generate an instance ID of the form `i-xxxxxxxx`.
pub fn new_instance_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("i-{}", &id[..8])
}

fn meta_data(instance_id: &str, hostname: &str) -> String {
    format!("instance-id: {instance_id}\nlocal-hostname: {hostname}\n")
}

fn scope_args(scope: &str) -> Vec<&str> {
    if scope == DEFAULT_SCOPE {
        Vec::new()
    } else {
        vec!["-P", scope]
    }
}

/// LXC container provider.
pub struct LxcProvider {
    config: LxcProviderConfig,
}

impl LxcProvider {
    /// Create a new LXC provider.
    ///
    /// Fails if the LXC tools are not installed.
    pub async fn new(config: LxcProviderConfig) -> Result<Self> {
        let found = match &config.tools_dir {
            Some(dir) => fs::metadata(dir.join("lxc-start-ephemeral")).await.is_ok(),
            None => Command::new("which")
                .arg("lxc-start-ephemeral")
                .output()
                .await
                .map(|o| o.status.success())
                .unwrap_or(false),
        };
        if !found {
            return Err(ProviderError::ToolNotFound("lxc-start-ephemeral".to_string()));
        }

        fs::create_dir_all(&config.data_dir).await?;
        info!(
            data_dir = %config.data_dir.display(),
            tools_dir = ?config.tools_dir,
            "LXC provider initialized"
        );

        Ok(Self { config })
    }

    fn instance_dir(&self, instance_id: &str) -> Result<PathBuf> {
        if !is_valid_instance_id(instance_id) {
            return Err(ProviderError::InvalidInstanceId(instance_id.to_string()));
        }
        Ok(self.config.data_dir.join(instance_id))
    }

    fn record_path(&self, instance_id: &str) -> Result<PathBuf> {
        Ok(self.instance_dir(instance_id)?.join("instance.yaml"))
    }

    fn tool(&self, program: &str) -> PathBuf {
        match &self.config.tools_dir {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!(program, ?args, "Running LXC command");
        let output = Command::new(self.tool(program))
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProviderError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list(&self, scope: &str) -> Result<Vec<LxcContainer>> {
        let mut args = vec!["--fancy"];
        args.extend(scope_args(scope));
        Ok(parse_lxc_ls(&self.run("lxc-ls", &args).await?))
    }

    async fn write_seed(
        &self,
        dir: &Path,
        instance_id: &str,
        hostname: &str,
        user_data: &[u8],
    ) -> Result<()> {
        fs::create_dir_all(dir).await?;
        fs::write(dir.join("user-data"), user_data).await?;
        fs::write(dir.join("meta-data"), meta_data(instance_id, hostname)).await?;
        Ok(())
    }

    async fn read_record(&self, instance_id: &str) -> Result<Option<InstanceRecord>> {
        match fs::read(self.record_path(instance_id)?).await {
            Ok(bytes) => Ok(Some(serde_yaml::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &InstanceRecord) -> Result<()> {
        let path = self.record_path(&record.properties.instance_id)?;
        fs::write(path, serde_yaml::to_string(record)?).await?;
        Ok(())
    }
}

#[async_trait]
impl ScopedLookup for LxcProvider {
    fn default_scope(&self) -> &str {
        DEFAULT_SCOPE
    }

    async fn scopes(&self) -> Result<Vec<String>> {
        let mut scopes = vec![DEFAULT_SCOPE.to_string()];
        scopes.extend(self.config.lxc_paths.iter().cloned());
        Ok(scopes)
    }

    async fn lookup(&self, scope: &str, instance_id: &str) -> Result<Option<Instance>> {
        let Some(record) = self.read_record(instance_id).await? else {
            return Ok(None);
        };
        if record.scope != scope {
            return Ok(None);
        }

        let listed = self
            .list(scope)
            .await?
            .into_iter()
            .find(|c| c.name == record.container);

        let mut properties = record.properties;
        let terminated = properties.status.as_deref() == Some(TERMINATED);
        match listed {
            Some(container) if !terminated => {
                properties.status = Some(container.state.to_lowercase());
                if container.ipv4.is_some() {
                    properties.ip_address = container.ipv4;
                }
            }
            Some(_) => {}
            None => {
                debug!(
                    instance_id,
                    scope,
                    container = %record.container,
                    "Container no longer listed, using instance record"
                );
                properties.status = Some(TERMINATED.to_string());
            }
        }
        properties.region = Some(scope.to_string());

        Ok(Some(Instance {
            properties,
            scope: scope.to_string(),
        }))
    }
}

#[async_trait]
impl Provider for LxcProvider {
    fn provider_type(&self) -> &'static str {
        "lxc"
    }

    fn config_schema(&self) -> &[PropertySpec] {
        &LXC_CONFIG_SCHEMA
    }

    async fn create_instance(&self, config: &LaunchConfig, user_data: &[u8]) -> Result<Instance> {
        let container_name = config
            .get_str("container_name")
            .ok_or_else(|| ProviderError::InvalidProperty {
                property: "container_name",
                message: "expected a string".to_string(),
            })?;
        let ephemeral = config.get_bool("ephemeral").unwrap_or(true);

        let instance_id = new_instance_id();
        let seed_dir = self.instance_dir(&instance_id)?.join("seed");
        let seed = seed_dir.to_string_lossy().into_owned();

        let (container, hostname) = if ephemeral {
            let clone = format!("{container_name}-{instance_id}");
            (clone.clone(), clone)
        } else {
            (container_name.to_string(), container_name.to_string())
        };

        self.write_seed(&seed_dir, &instance_id, &hostname, user_data)
            .await?;

        if ephemeral {
            self.run(
                "lxc-start-ephemeral",
                &[
                    "-d",
                    "-o",
                    container_name,
                    "-n",
                    container.as_str(),
                    "-b",
                    seed.as_str(),
                ],
            )
            .await?;
        } else {
            self.run("lxc-start", &["-d", "-n", container.as_str()])
                .await?;
        }

        let listed = self
            .list(DEFAULT_SCOPE)
            .await?
            .into_iter()
            .find(|c| c.name == container);

        let properties = InstanceProperties {
            instance_id: instance_id.clone(),
            image: Some(container_name.to_string()),
            api_termination_disabled: Some(false),
            ip_address: listed.as_ref().and_then(|c| c.ipv4.clone()),
            status: Some(
                listed
                    .as_ref()
                    .map(|c| c.state.to_lowercase())
                    .unwrap_or_else(|| "pending".to_string()),
            ),
            region: Some(DEFAULT_SCOPE.to_string()),
            launch_time: Some(Utc::now()),
            tags: config.tags(),
            ..Default::default()
        };

        self.write_record(&InstanceRecord {
            container: container.clone(),
            ephemeral,
            scope: DEFAULT_SCOPE.to_string(),
            properties: properties.clone(),
        })
        .await?;

        info!(
            instance_id = %instance_id,
            container = %container,
            ephemeral,
            "Started LXC container"
        );

        Ok(Instance {
            properties,
            scope: DEFAULT_SCOPE.to_string(),
        })
    }

    async fn find_instance(&self, instance_id: &str) -> Result<Option<Instance>> {
        find_in_scopes(self, instance_id).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        let Some(mut record) = self.read_record(instance_id).await? else {
            return Err(ProviderError::InstanceNotFound(instance_id.to_string()));
        };
        if record.properties.status.as_deref() == Some(TERMINATED) {
            debug!(instance_id, "Instance already terminated");
            return Ok(());
        }

        let mut args = vec!["-n", record.container.as_str()];
        args.extend(scope_args(&record.scope));
        self.run("lxc-stop", &args).await?;

        record.properties.status = Some(TERMINATED.to_string());
        self.write_record(&record).await?;

        info!(
            instance_id = %instance_id,
            container = %record.container,
            ephemeral = record.ephemeral,
            "Stopped LXC container"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FANCY: &str = "\
NAME         STATE    IPV4                  IPV6  AUTOSTART
-----------------------------------------------------------
base         STOPPED  -                     -     NO
web1-i-1a2b  RUNNING  10.0.3.15, 10.0.4.1   -     NO
";

    #[test]
    fn test_parse_lxc_ls() {
        let containers = parse_lxc_ls(FANCY);

        assert_eq!(
            containers,
            vec![
                LxcContainer {
                    name: "base".to_string(),
                    state: "STOPPED".to_string(),
                    ipv4: None,
                },
                LxcContainer {
                    name: "web1-i-1a2b".to_string(),
                    state: "RUNNING".to_string(),
                    ipv4: Some("10.0.3.15".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_lxc_ls_newer_columns() {
        let output = "\
NAME STATE   AUTOSTART GROUPS IPV4       IPV6 UNPRIVILEGED
web1 RUNNING 0         -      10.0.3.200 -    false
";
        let containers = parse_lxc_ls(output);

        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "web1");
        assert_eq!(containers[0].ipv4.as_deref(), Some("10.0.3.200"));
    }

    #[test]
    fn test_parse_lxc_ls_empty() {
        assert!(parse_lxc_ls("").is_empty());
        assert!(parse_lxc_ls("NAME STATE IPV4\n").is_empty());
        assert!(parse_lxc_ls("garbage without header columns\nrow").is_empty());
    }

    #[test]
    fn test_instance_id_format() {
        let id = new_instance_id();

        assert_eq!(id.len(), 10);
        assert!(id.starts_with("i-"));
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_schema_defaults_ephemeral() {
        let config = LaunchConfig::new()
            .with("container_name", "web1")
            .validate(&LXC_CONFIG_SCHEMA)
            .unwrap();

        assert_eq!(config.get_bool("ephemeral"), Some(true));
    }

    #[test]
    fn test_schema_requires_container_name() {
        let err = LaunchConfig::new().validate(&LXC_CONFIG_SCHEMA).unwrap_err();
        assert!(err.to_string().contains("container_name"));
    }

    #[test]
    fn test_meta_data() {
        assert_eq!(
            meta_data("i-1a2b3c4d", "web1"),
            "instance-id: i-1a2b3c4d\nlocal-hostname: web1\n"
        );
    }

    #[test]
    fn test_scope_args() {
        assert!(scope_args(DEFAULT_SCOPE).is_empty());
        assert_eq!(scope_args("/srv/lxc"), vec!["-P", "/srv/lxc"]);
    }

    #[test]
    fn test_config_from_config() {
        let config = Config {
            archive: Default::default(),
            data_dir: PathBuf::from("/var/lib/cloudmaker"),
            lxc_paths: vec!["/srv/lxc".to_string()],
            lxc_tools_dir: Some(PathBuf::from("/opt/lxc/bin")),
        };

        let lxc = LxcProviderConfig::from_config(&config);
        assert_eq!(lxc.data_dir, PathBuf::from("/var/lib/cloudmaker/lxc"));
        assert_eq!(lxc.lxc_paths, vec!["/srv/lxc"]);
        assert_eq!(lxc.tools_dir, Some(PathBuf::from("/opt/lxc/bin")));
    }
}
