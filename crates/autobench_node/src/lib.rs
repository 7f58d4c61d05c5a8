//! Node-level provisioning for benchmark clusters: installs the database
//! server on a remote host, prepares its scratch volume, and initializes it.

pub mod blueprint;
pub mod channel;
pub mod command;
pub mod common;
pub mod config;
pub mod disk;
pub mod error;
pub mod node;
pub mod root_access;
pub mod ssh;
pub mod volume;

#[cfg(test)]
mod testing;

pub use blueprint::NodeBlueprint;
pub use channel::{Platform, RemoteChannel};
pub use command::RemoteCommand;
pub use config::AutobenchConfig;
pub use disk::PartitionOutcome;
pub use error::{ChannelError, ProvisionError, ProvisionResult};
pub use node::Node;
pub use ssh::{SshClient, SshConfig};
pub use volume::{LastDiskVolume, VolumeSelector};
