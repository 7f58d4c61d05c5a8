//! Root SSH access bootstrap.
//!
//! Cloud images ship root's `authorized_keys` with a forced-command prefix in
//! front of the instance key. Dropping everything before the key lets the
//! benchmark tooling log in as root directly.

use log::{info, warn};

use crate::channel::RemoteChannel;
use crate::command::RemoteCommand;
use crate::common::{AUTHORIZED_KEY_PREFIX, ROOT_AUTHORIZED_KEYS};
use crate::error::{ProvisionError, ProvisionResult};

/// Rewrite root's authorized keys to start at the first embedded public key
/// and restart the SSH daemon.
///
/// Every failure is a [`ProvisionError::RootAccess`]; the host may be left
/// without working root access, so callers are expected to stop the process.
pub fn login_as_root<C>(channel: &C) -> ProvisionResult<()>
where
    C: RemoteChannel + ?Sized,
{
    let host = channel.host();
    info!(host = host; "Bootstrapping root login");

    channel
        .execute(&RemoteCommand::sudo("-n").arg("true"))
        .map_err(|e| ProvisionError::root_access("become root", Some(e)))?;

    let authorized_keys = channel
        .execute(&RemoteCommand::sudo("cat").arg(ROOT_AUTHORIZED_KEYS))
        .map_err(|e| ProvisionError::root_access("read authorized_keys", Some(e)))?;

    let key = retain_embedded_key(&authorized_keys).ok_or_else(|| {
        warn!(host = host; "{AUTHORIZED_KEY_PREFIX} not found in {ROOT_AUTHORIZED_KEYS}");
        ProvisionError::root_access(
            format!("find {AUTHORIZED_KEY_PREFIX} in authorized_keys"),
            None,
        )
    })?;

    let write_keys = RemoteCommand::new("printf")
        .arg(r"%s\n")
        .arg(key)
        .pipe(RemoteCommand::sudo("tee").arg(ROOT_AUTHORIZED_KEYS));
    channel
        .execute(&write_keys)
        .map_err(|e| ProvisionError::root_access("write to authorized_keys", Some(e)))?;

    let restart_sshd = RemoteCommand::sudo("systemctl")
        .args(["restart", "sshd.service"])
        .or_else(RemoteCommand::sudo("systemctl").args(["restart", "ssh.service"]));
    channel
        .execute(&restart_sshd)
        .map_err(|e| ProvisionError::root_access("restart SSH service", Some(e)))?;

    info!(host = host; "Root login enabled");
    Ok(())
}

/// The authorized keys content from the first key onwards, without the
/// trailing newline.
fn retain_embedded_key(authorized_keys: &str) -> Option<&str> {
    let start = authorized_keys.find(AUTHORIZED_KEY_PREFIX)?;
    Some(authorized_keys[start..].trim_end())
}
