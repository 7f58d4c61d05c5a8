use log::{info, warn};
use std::path::Path;
use std::time::Duration;

use crate::blueprint::NodeBlueprint;
use crate::channel::RemoteChannel;
use crate::command::RemoteCommand;
use crate::common::*;
use crate::disk::{self, PartitionOutcome};
use crate::error::{ChannelError, ProvisionError, ProvisionResult, StageContext};
use crate::root_access;
use crate::volume::{LastDiskVolume, VolumeSelector};

/// A remote server node, which may or may not be set up yet.
///
/// Owns the blueprint and the command channel of exactly one host.
pub struct Node<C: RemoteChannel> {
    blueprint: NodeBlueprint,
    channel: C,
    settle_delay: Duration,
}

impl<C: RemoteChannel> Node<C> {
    pub fn new(blueprint: NodeBlueprint, channel: C) -> ProvisionResult<Self> {
        if blueprint.host != channel.host() {
            return Err(ProvisionError::HostMismatch {
                blueprint: blueprint.host,
                channel: channel.host().to_string(),
            });
        }
        Ok(Self {
            blueprint,
            channel,
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    /// Override the wait between installing the server and fixing permissions.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn blueprint(&self) -> &NodeBlueprint {
        &self.blueprint
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn host(&self) -> &str {
        &self.blueprint.host
    }

    /// Install dependencies and a fresh copy of the server from `package_path`.
    pub fn provision(&self, package_path: &Path) -> ProvisionResult<()> {
        self.install_deps().stage("failed to install dependencies")?;

        self.uninstall_server()
            .stage(format!("failed to uninstall {SERVER_PACKAGE}"))?;

        self.install_server(package_path)
            .stage(format!("failed to install {SERVER_PACKAGE}"))?;

        // The server starts asynchronously after install and exposes nothing to poll
        info!(host = self.host(), delay_secs = self.settle_delay.as_secs(); "Waiting for server to settle");
        std::thread::sleep(self.settle_delay);

        self.give_server_permissions()
            .stage(format!("failed to give {SERVER_PACKAGE} permissions"))?;

        Ok(())
    }

    fn install_deps(&self) -> ProvisionResult<()> {
        info!(host = self.host(); "Installing dependencies");
        let deps = self.channel.platform().dependencies();
        self.channel.install_packages(deps)?;
        Ok(())
    }

    fn uninstall_server(&self) -> ProvisionResult<()> {
        info!(host = self.host(); "Uninstalling '{SERVER_PACKAGE}'");
        self.channel
            .uninstall_packages(&[SERVER_PACKAGE])
            .stage(format!("failed to uninstall '{SERVER_PACKAGE}'"))?;

        info!(host = self.host(); "Purging install directory");
        self.channel
            .remove_directory(SERVER_INSTALL_DIR)
            .stage(format!(
                "failed to cleanup install directory at '{SERVER_INSTALL_DIR}'"
            ))?;

        Ok(())
    }

    /// Upload the package archive, install it and remove the archive again.
    fn install_server(&self, local_path: &Path) -> ProvisionResult<()> {
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ProvisionError::MissingPackage(format!(
                    "{} has no file name",
                    local_path.display()
                ))
            })?;
        let remote_path = staged_package_path(&file_name);

        info!(host = self.host(); "Uploading package archive");
        match self.channel.secure_upload(local_path, &remote_path) {
            Ok(()) => {}
            Err(ChannelError::AlreadyExists(_)) => {
                info!(host = self.host(); "Package archive already exists, skipping upload");
            }
            Err(e) => return Err(ProvisionError::stage("failed to upload package archive", e)),
        }

        info!(host = self.host(); "Installing '{SERVER_PACKAGE}'");
        if let Err(e) = self.channel.install_package_at(&remote_path) {
            // A failed install drops the archive so the next run uploads it again
            warn!(host = self.host(); "Install failed, removing package archive {remote_path}");
            if let Err(cleanup) = self.channel.remove_file(&remote_path) {
                warn!(host = self.host(); "Failed to remove package archive: {cleanup}");
            }
            return Err(ProvisionError::stage(
                format!("failed to install '{SERVER_PACKAGE}'"),
                e,
            ));
        }

        info!(host = self.host(); "Cleaning up package archive");
        self.channel
            .remove_file(&remote_path)
            .stage("failed to remove package archive")?;

        Ok(())
    }

    /// Hand the scratch mount over to the server's runtime user.
    fn give_server_permissions(&self) -> ProvisionResult<()> {
        info!(host = self.host(); "Giving '{SERVER_PACKAGE}' ownership of {SCRATCH_MOUNT_POINT}");
        let chown = RemoteCommand::sudo("chown").args(["-R", SERVER_OWNER, SCRATCH_MOUNT_POINT]);
        self.channel
            .execute(&chown)
            .stage(format!("failed to change permissions on {SCRATCH_MOUNT_POINT}"))?;
        Ok(())
    }

    /// Ensure the configured data path exists and belongs to the server user.
    pub fn create_data_path(&self) -> ProvisionResult<()> {
        let Some(path) = self.blueprint.data_path() else {
            return Ok(());
        };
        info!(host = self.host(), data_path = path; "Creating/configuring data path");
        self.create_owned_dir(path, "data")
    }

    /// Ensure the configured index path exists and belongs to the server user.
    pub fn create_index_path(&self) -> ProvisionResult<()> {
        let Some(path) = self.blueprint.index_path() else {
            return Ok(());
        };
        info!(host = self.host(), index_path = path; "Creating/configuring index path");
        self.create_owned_dir(path, "index")
    }

    fn create_owned_dir(&self, path: &str, kind: &str) -> ProvisionResult<()> {
        self.channel
            .execute(&RemoteCommand::sudo("mkdir").args(["-p", path]))
            .stage(format!("failed to create remote {kind} directory"))?;
        self.channel
            .execute(&RemoteCommand::sudo("chown").args(["-R", SERVER_OWNER, path]))
            .stage(format!("failed to chown remote {kind} directory"))?;
        Ok(())
    }

    /// Node-level initialization against the local admin endpoint.
    pub fn initialize(&self) -> ProvisionResult<()> {
        let data_path = self.blueprint.data_path();
        let index_path = self.blueprint.index_path();
        info!(
            host = self.host(),
            data_path = data_path.unwrap_or_default(),
            index_path = index_path.unwrap_or_default();
            "Initializing node"
        );

        let node_init = RemoteCommand::new("couchbase-cli")
            .arg("node-init")
            .args(["-c", ADMIN_ENDPOINT])
            .args(["-u", ADMIN_USERNAME])
            .args(["-p", ADMIN_PASSWORD])
            .opt_arg("--node-init-data-path", data_path)
            .opt_arg("--node-init-index-path", index_path);
        self.channel
            .execute(&node_init)
            .stage("failed to initialize node")?;
        Ok(())
    }

    /// Stop and disable the server, used when the host serves as a
    /// load-generation client instead.
    pub fn disable(&self) -> ProvisionResult<()> {
        info!(host = self.host(); "Disabling '{SERVER_SERVICE}'");
        let disable = self.channel.platform().disable_server_command();
        self.channel
            .execute(&disable)
            .stage(format!("failed to disable {SERVER_SERVICE}"))?;
        Ok(())
    }

    /// Partition and mount the attached scratch volume, skipping volumes that
    /// are already partitioned.
    pub fn partition_attached_volume(&self) -> ProvisionResult<PartitionOutcome> {
        self.partition_attached_volume_with(&LastDiskVolume)
    }

    pub fn partition_attached_volume_with(
        &self,
        selector: &dyn VolumeSelector,
    ) -> ProvisionResult<PartitionOutcome> {
        disk::partition_attached_volume(&self.channel, selector)
    }

    /// Restrict root's authorized keys to the embedded key. Errors are
    /// [`ProvisionError::RootAccess`] and should terminate the caller.
    pub fn login_as_root(&self) -> ProvisionResult<()> {
        root_access::login_as_root(&self.channel)
    }

    /// Release the command channel.
    pub fn close(mut self) -> ProvisionResult<()> {
        self.channel.close()?;
        Ok(())
    }
}
