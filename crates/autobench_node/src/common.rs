use std::time::Duration;

pub const SERVER_PACKAGE: &str = "couchbase-server";
pub const SERVER_SERVICE: &str = "couchbase-server";
pub const SERVER_INSTALL_DIR: &str = "/opt/couchbase";
pub const SERVER_OWNER: &str = "couchbase:couchbase";
pub const PACKAGE_STAGING_DIR: &str = "/home/ec2-user";

// Benchmark clusters are disposable, the default credentials are never rotated
pub const ADMIN_ENDPOINT: &str = "localhost:8091";
pub const ADMIN_USERNAME: &str = "Administrator";
pub const ADMIN_PASSWORD: &str = "asdasd";

pub const SCRATCH_MOUNT_POINT: &str = "/mnt";
pub const SCRATCH_FS_TYPE: &str = "xfs";
pub const SCRATCH_PERMISSIONS: &str = "777";

pub const ROOT_AUTHORIZED_KEYS: &str = "/root/.ssh/authorized_keys";
pub const AUTHORIZED_KEY_PREFIX: &str = "ssh-rsa";

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(30);

/// Location of the uploaded package archive on the remote host.
pub fn staged_package_path(file_name: &str) -> String {
    format!("{PACKAGE_STAGING_DIR}/{file_name}")
}
