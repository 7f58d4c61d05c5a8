use std::io;
use thiserror::Error;

/// Failures reported by a [`crate::channel::RemoteChannel`].
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The command exited non-zero or the transport failed to deliver it.
    #[error("remote command `{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The upload target is already present on the remote host.
    #[error("remote file {0} already exists")]
    AlreadyExists(String),

    #[error("failed to upload {local} to {remote}: {source}")]
    Upload {
        local: String,
        remote: String,
        #[source]
        source: io::Error,
    },

    #[error("unsupported remote platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors of a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A failed step, wrapped with a description of the stage it belongs to.
    #[error("{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("no disk volume found in lsblk output")]
    NoDiskVolume,

    /// The partition probe itself failed, so it is unknown whether the
    /// volume is already partitioned.
    #[error("failed to probe partitions of /dev/{volume}: {source}")]
    PartitionProbe {
        volume: String,
        #[source]
        source: ChannelError,
    },

    /// The local package archive to install is missing or unusable.
    #[error("no usable package archive: {0}")]
    MissingPackage(String),

    #[error("blueprint host {blueprint} does not match channel host {channel}")]
    HostMismatch { blueprint: String, channel: String },

    /// Root access bootstrap failed. Callers should treat this as fatal.
    #[error("failed to {step}")]
    RootAccess {
        step: String,
        #[source]
        source: Option<ChannelError>,
    },
}

impl ProvisionError {
    pub fn stage(stage: impl Into<String>, source: impl Into<ProvisionError>) -> Self {
        ProvisionError::Stage {
            stage: stage.into(),
            source: Box::new(source.into()),
        }
    }

    pub fn root_access(step: impl Into<String>, source: Option<ChannelError>) -> Self {
        ProvisionError::RootAccess {
            step: step.into(),
            source,
        }
    }

    /// Whether the error (or anything it wraps) must terminate the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProvisionError::RootAccess { .. } => true,
            ProvisionError::Stage { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// The innermost error, skipping stage wrappers.
    pub fn root_cause(&self) -> &ProvisionError {
        match self {
            ProvisionError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Attach a stage description to a failed step.
pub trait StageContext<T> {
    fn stage(self, stage: impl Into<String>) -> ProvisionResult<T>;
}

impl<T, E> StageContext<T> for Result<T, E>
where
    E: Into<ProvisionError>,
{
    fn stage(self, stage: impl Into<String>) -> ProvisionResult<T> {
        self.map_err(|e| ProvisionError::stage(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_failed(command: &str) -> ChannelError {
        ChannelError::Command {
            command: command.to_string(),
            source: io::Error::other("exit status: 1"),
        }
    }

    #[test]
    fn test_stage_message_chain() {
        let err: Result<(), ChannelError> = Err(command_failed("yum install -y lsof"));
        let err = err.stage("failed to install dependencies").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to install dependencies: remote command `yum install -y lsof` failed: exit status: 1"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_root_access_is_fatal_through_stages() {
        let err = ProvisionError::stage(
            "failed to bootstrap root access",
            ProvisionError::root_access("read authorized_keys", Some(command_failed("cat"))),
        );
        assert!(err.is_fatal());
        assert!(matches!(
            err.root_cause(),
            ProvisionError::RootAccess { step, .. } if step == "read authorized_keys"
        ));
    }

    #[test]
    fn test_no_disk_volume_is_not_fatal() {
        let err = ProvisionError::stage("failed to extract last volume name", ProvisionError::NoDiskVolume);
        assert!(!err.is_fatal());
        assert!(matches!(err.root_cause(), ProvisionError::NoDiskVolume));
    }
}
