use cmd_lib::*;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::channel::{Platform, RemoteChannel};
use crate::command::RemoteCommand;
use crate::error::ChannelError;

const DEFAULT_SSH_USER: &str = "ec2-user";
const DEFAULT_SSH_PORT: u16 = 22;
const CONTROL_PERSIST_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

fn default_username() -> String {
    DEFAULT_SSH_USER.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            port: default_port(),
            identity_file: None,
            strict_host_key_checking: false,
        }
    }
}

/// [`RemoteChannel`] over the system `ssh` and `scp` binaries.
///
/// All commands share one multiplexed connection (ssh ControlMaster), which
/// [`RemoteChannel::close`] tears down.
pub struct SshClient {
    host: String,
    target: String,
    port: String,
    options: Vec<String>,
    platform: Platform,
    closed: bool,
}

impl SshClient {
    /// Connect to `host` and detect its platform.
    pub fn connect(host: &str, config: &SshConfig) -> Result<Self, ChannelError> {
        let mut client = Self {
            host: host.to_string(),
            target: format!("{}@{host}", config.username),
            port: config.port.to_string(),
            options: connection_options(config),
            platform: Platform::AmazonLinux,
            closed: false,
        };

        let os_release = client.execute(&RemoteCommand::new("cat").arg("/etc/os-release"))?;
        client.platform = Platform::from_os_release(&os_release)?;
        debug!(host = host, platform = client.platform.as_ref(); "Connected");
        Ok(client)
    }
}

fn connection_options(config: &SshConfig) -> Vec<String> {
    let control_path = std::env::temp_dir().join("autobench-ssh-%C");
    let mut options = vec![
        "BatchMode=yes".to_string(),
        "ControlMaster=auto".to_string(),
        format!("ControlPath={}", control_path.display()),
        format!("ControlPersist={CONTROL_PERSIST_SECS}"),
    ];
    if !config.strict_host_key_checking {
        options.push("StrictHostKeyChecking=no".to_string());
        options.push("UserKnownHostsFile=/dev/null".to_string());
        options.push("LogLevel=ERROR".to_string());
    }

    let mut args: Vec<String> = options
        .into_iter()
        .flat_map(|option| ["-o".to_string(), option])
        .collect();
    if let Some(identity_file) = &config.identity_file {
        args.push("-i".to_string());
        args.push(identity_file.display().to_string());
    }
    args
}

fn partial_upload_path(remote_path: &str) -> String {
    format!("{remote_path}.part")
}

impl RemoteChannel for SshClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn execute(&self, command: &RemoteCommand) -> Result<String, ChannelError> {
        let options = &self.options;
        let port = &self.port;
        let target = &self.target;
        let line = command.as_str();
        debug!(host = self.host.as_str(); "Running: {line}");

        run_fun!(ssh $[options] -p $port $target $line).map_err(|source| ChannelError::Command {
            command: line.to_string(),
            source,
        })
    }

    fn secure_upload(&self, local_path: &Path, remote_path: &str) -> Result<(), ChannelError> {
        if self
            .execute(&RemoteCommand::new("test").args(["-e", remote_path]))
            .is_ok()
        {
            return Err(ChannelError::AlreadyExists(remote_path.to_string()));
        }

        // Copy next to the target and rename, so remote_path only ever holds a
        // complete file
        let partial_path = partial_upload_path(remote_path);
        let options = &self.options;
        let port = &self.port;
        let local = local_path.display().to_string();
        let destination = format!("{}:{partial_path}", self.target);
        debug!(host = self.host.as_str(); "Uploading {local} to {remote_path}");

        run_cmd!(scp -q $[options] -P $port $local $destination).map_err(|source| {
            ChannelError::Upload {
                local: local_path.display().to_string(),
                remote: remote_path.to_string(),
                source,
            }
        })?;
        self.execute(&RemoteCommand::new("mv").args(["-f", partial_path.as_str(), remote_path]))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let options = &self.options;
        let port = &self.port;
        let target = &self.target;
        // No master running means there is nothing to release
        if run_cmd!(ssh $[options] -p $port -O check $target 2>/dev/null).is_err() {
            return Ok(());
        }
        run_cmd!(ssh $[options] -p $port -O exit $target 2>/dev/null)?;
        debug!(host = self.host.as_str(); "Closed connection");
        Ok(())
    }
}
