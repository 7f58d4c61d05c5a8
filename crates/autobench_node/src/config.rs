use serde::Deserialize;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blueprint::NodeBlueprint;
use crate::common::DEFAULT_SETTLE_DELAY;
use crate::ssh::SshConfig;

#[derive(Debug, Deserialize)]
pub struct AutobenchConfig {
    /// Server install package uploaded to every node.
    #[serde(default)]
    pub package: Option<PathBuf>,
    #[serde(default)]
    pub settle_delay_secs: Option<u64>,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub nodes: Vec<NodeBlueprint>,
}

impl AutobenchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::other(format!(
                "Failed to read config from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::parse(&content).map_err(|e| {
            Error::other(format!(
                "Failed to parse config from {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SETTLE_DELAY)
    }

    /// Blueprints to work on, optionally narrowed to a single host.
    pub fn select_nodes(&self, host: Option<&str>) -> Result<Vec<&NodeBlueprint>, Error> {
        let nodes: Vec<&NodeBlueprint> = self
            .nodes
            .iter()
            .filter(|node| host.is_none_or(|host| node.host == host))
            .collect();
        if nodes.is_empty() {
            return Err(match host {
                Some(host) => Error::other(format!("Host {host} not found in config")),
                None => Error::other("No nodes configured"),
            });
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
package = "/builds/couchbase-server-enterprise-7.2.0-amzn2.x86_64.rpm"
settle_delay_secs = 5

[ssh]
username = "root"
identity_file = "/keys/bench.pem"

[[nodes]]
host = "10.0.0.10"
data_path = "/data"
index_path = "/index"

[[nodes]]
host = "10.0.0.11"
"#;

    #[test]
    fn test_parse_config() {
        let config = AutobenchConfig::parse(CONFIG).unwrap();
        assert_eq!(config.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.ssh.username, "root");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].data_path(), Some("/data"));
        assert_eq!(config.nodes[1].index_path(), None);
    }

    #[test]
    fn test_defaults() {
        let config = AutobenchConfig::parse("[[nodes]]\nhost = \"10.0.0.10\"\n").unwrap();
        assert_eq!(config.settle_delay(), DEFAULT_SETTLE_DELAY);
        assert_eq!(config.ssh.username, "ec2-user");
        assert!(config.package.is_none());
    }

    #[test]
    fn test_select_nodes() {
        let config = AutobenchConfig::parse(CONFIG).unwrap();
        assert_eq!(config.select_nodes(None).unwrap().len(), 2);

        let nodes = config.select_nodes(Some("10.0.0.11")).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].host, "10.0.0.11");

        assert!(config.select_nodes(Some("10.0.0.99")).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = AutobenchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.nodes[0].host, "10.0.0.10");
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nodes = 3").unwrap();

        let err = AutobenchConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config from"));
    }
}
