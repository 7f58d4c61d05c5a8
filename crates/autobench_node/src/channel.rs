use std::path::Path;
use std::str::FromStr;
use strum::{AsRefStr, EnumString};

use crate::command::RemoteCommand;
use crate::common::SERVER_SERVICE;
use crate::error::ChannelError;

/// Operating system family of a remote host, keyed by the `ID` field of
/// `/etc/os-release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    #[strum(serialize = "amzn")]
    AmazonLinux,
    Centos,
    Rhel,
    Ubuntu,
    Debian,
}

impl Platform {
    pub fn from_os_release(os_release: &str) -> Result<Self, ChannelError> {
        let id = os_release
            .lines()
            .find_map(|line| line.trim().strip_prefix("ID="))
            .map(|id| id.trim_matches('"'))
            .ok_or_else(|| ChannelError::UnsupportedPlatform("missing ID in os-release".into()))?;
        Platform::from_str(id).map_err(|_| ChannelError::UnsupportedPlatform(id.to_string()))
    }

    fn uses_apt(self) -> bool {
        matches!(self, Platform::Ubuntu | Platform::Debian)
    }

    /// Packages the server needs which are not part of a minimal image.
    pub fn dependencies(self) -> &'static [&'static str] {
        if self.uses_apt() {
            &["libtinfo5", "python3", "python3-httplib2", "bzip2", "xfsprogs"]
        } else {
            &["ncurses-compat-libs", "python3", "bzip2", "xfsprogs"]
        }
    }

    fn package_manager(self) -> RemoteCommand {
        if self.uses_apt() {
            RemoteCommand::sudo("env")
                .arg("DEBIAN_FRONTEND=noninteractive")
                .arg("apt-get")
        } else {
            RemoteCommand::sudo("yum")
        }
    }

    pub fn install_packages_command(self, names: &[&str]) -> RemoteCommand {
        self.package_manager().args(["install", "-y"]).args(names)
    }

    pub fn uninstall_packages_command(self, names: &[&str]) -> RemoteCommand {
        let verb = if self.uses_apt() { "purge" } else { "remove" };
        self.package_manager().args([verb, "-y"]).args(names)
    }

    /// Install a package archive that already sits on the remote host.
    pub fn install_local_package_command(self, remote_path: &str) -> RemoteCommand {
        self.package_manager().args(["install", "-y", remote_path])
    }

    pub fn disable_server_command(self) -> RemoteCommand {
        RemoteCommand::sudo("systemctl").args(["disable", "--now", SERVER_SERVICE])
    }
}

/// A command channel bound to exactly one remote host.
///
/// Calls block until the remote side finishes; nothing is retried.
pub trait RemoteChannel {
    fn host(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Run a command and return its standard output.
    fn execute(&self, command: &RemoteCommand) -> Result<String, ChannelError>;

    /// Copy a local file to the remote host. Fails with
    /// [`ChannelError::AlreadyExists`] when `remote_path` is already present.
    fn secure_upload(&self, local_path: &Path, remote_path: &str) -> Result<(), ChannelError>;

    fn install_packages(&self, names: &[&str]) -> Result<(), ChannelError> {
        if names.is_empty() {
            return Ok(());
        }
        self.execute(&self.platform().install_packages_command(names))?;
        Ok(())
    }

    fn uninstall_packages(&self, names: &[&str]) -> Result<(), ChannelError> {
        if names.is_empty() {
            return Ok(());
        }
        self.execute(&self.platform().uninstall_packages_command(names))?;
        Ok(())
    }

    fn install_package_at(&self, remote_path: &str) -> Result<(), ChannelError> {
        self.execute(&self.platform().install_local_package_command(remote_path))?;
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), ChannelError> {
        self.execute(&RemoteCommand::sudo("rm").args(["-f", path]))?;
        Ok(())
    }

    fn remove_directory(&self, path: &str) -> Result<(), ChannelError> {
        self.execute(&RemoteCommand::sudo("rm").args(["-rf", path]))?;
        Ok(())
    }

    /// Release the underlying connection.
    fn close(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_os_release() {
        let amzn = "NAME=\"Amazon Linux\"\nVERSION=\"2\"\nID=\"amzn\"\nID_LIKE=\"centos rhel fedora\"\n";
        assert_eq!(Platform::from_os_release(amzn).unwrap(), Platform::AmazonLinux);

        let ubuntu = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(Platform::from_os_release(ubuntu).unwrap(), Platform::Ubuntu);
    }

    #[test]
    fn test_platform_unsupported() {
        let err = Platform::from_os_release("ID=\"arch\"\n").unwrap_err();
        assert!(matches!(err, ChannelError::UnsupportedPlatform(id) if id == "arch"));

        let err = Platform::from_os_release("NAME=\"Mystery\"\n").unwrap_err();
        assert!(matches!(err, ChannelError::UnsupportedPlatform(_)));
    }

    #[test]
    fn test_package_commands() {
        assert_eq!(
            Platform::AmazonLinux
                .install_packages_command(&["bzip2", "xfsprogs"])
                .as_str(),
            "sudo yum install -y bzip2 xfsprogs"
        );
        assert_eq!(
            Platform::Ubuntu
                .uninstall_packages_command(&["couchbase-server"])
                .as_str(),
            "sudo env DEBIAN_FRONTEND=noninteractive apt-get purge -y couchbase-server"
        );
        assert_eq!(
            Platform::Centos
                .install_local_package_command("/home/ec2-user/cb.rpm")
                .as_str(),
            "sudo yum install -y /home/ec2-user/cb.rpm"
        );
        assert_eq!(
            Platform::Debian.disable_server_command().as_str(),
            "sudo systemctl disable --now couchbase-server"
        );
    }
}
