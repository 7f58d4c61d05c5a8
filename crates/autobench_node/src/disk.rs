//! Scratch volume preparation.
//!
//! Whether the volume still needs work is decided by probing the host on every
//! run, so the sequence can be re-run after an interruption at any step.

use log::info;

use crate::channel::RemoteChannel;
use crate::command::RemoteCommand;
use crate::common::{SCRATCH_FS_TYPE, SCRATCH_MOUNT_POINT, SCRATCH_PERMISSIONS};
use crate::error::{ProvisionError, ProvisionResult, StageContext};
use crate::volume::{VolumeSelector, first_partition_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The first partition was already present; nothing was changed.
    AlreadyPartitioned { volume: String },
    /// The volume was partitioned, formatted and mounted by this run.
    Partitioned { volume: String, partition: String },
}

/// Partition, format and mount the attached scratch volume unless its first
/// partition already exists.
pub fn partition_attached_volume<C>(
    channel: &C,
    selector: &dyn VolumeSelector,
) -> ProvisionResult<PartitionOutcome>
where
    C: RemoteChannel + ?Sized,
{
    let host = channel.host();
    info!(host = host; "Checking and partitioning attached volume");

    let list_volumes = RemoteCommand::new("lsblk").args(["-o", "NAME,SIZE,TYPE,MOUNTPOINT"]);
    let all_volumes = channel
        .execute(&list_volumes)
        .stage("failed to check for all volumes")?;

    let volume = selector
        .select(&all_volumes)
        .stage("failed to extract last volume name")?;
    let partition = first_partition_name(&volume);
    info!(host = host, volume = volume.as_str(); "Selected scratch volume");

    if is_partitioned(channel, &volume, &partition)? {
        info!(host = host, volume = volume.as_str(); "Volume is already partitioned, skipping partitioning");
        return Ok(PartitionOutcome::AlreadyPartitioned { volume });
    }

    let volume_dev = format!("/dev/{volume}");
    let partition_dev = format!("/dev/{partition}");

    info!(host = host, volume = volume.as_str(); "Partitioning volume");
    let whole_disk = RemoteCommand::new("echo")
        .arg(",,,;")
        .pipe(RemoteCommand::sudo("sfdisk").arg(&volume_dev));
    channel
        .execute(&whole_disk)
        .stage(format!("failed to partition {volume_dev}"))?;

    let mkfs = format!("mkfs.{SCRATCH_FS_TYPE}");
    channel
        .execute(&RemoteCommand::sudo(&mkfs).arg(&partition_dev))
        .stage(format!("failed to create {SCRATCH_FS_TYPE} filesystem on {partition_dev}"))?;

    channel
        .execute(&RemoteCommand::sudo("mount").args([partition_dev.as_str(), SCRATCH_MOUNT_POINT]))
        .stage(format!("failed to mount {partition_dev} at {SCRATCH_MOUNT_POINT}"))?;

    channel
        .execute(&RemoteCommand::sudo("chmod").args([SCRATCH_PERMISSIONS, SCRATCH_MOUNT_POINT]))
        .stage(format!("failed to change permissions on {SCRATCH_MOUNT_POINT}"))?;

    info!(host = host, volume = volume.as_str(); "Scratch volume mounted at {SCRATCH_MOUNT_POINT}");
    Ok(PartitionOutcome::Partitioned { volume, partition })
}

fn is_partitioned<C>(channel: &C, volume: &str, partition: &str) -> ProvisionResult<bool>
where
    C: RemoteChannel + ?Sized,
{
    let probe = RemoteCommand::new("lsblk")
        .args(["-n", "-o", "NAME"])
        .arg(format!("/dev/{volume}"));
    let output = channel
        .execute(&probe)
        .map_err(|source| ProvisionError::PartitionProbe {
            volume: volume.to_string(),
            source,
        })?;
    Ok(lists_partition(&output, partition))
}

/// Whether `lsblk -n -o NAME` output names `partition`, ignoring tree glyphs.
fn lists_partition(output: &str, partition: &str) -> bool {
    output
        .lines()
        .map(|line| line.trim_start_matches(|c: char| !c.is_ascii_alphanumeric()).trim_end())
        .any(|name| name == partition)
}
