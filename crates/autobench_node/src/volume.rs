//! Block device selection from `lsblk -o NAME,SIZE,TYPE,MOUNTPOINT` output.

use crate::error::ProvisionError;

/// Picks the scratch volume out of a block device listing.
pub trait VolumeSelector {
    fn select(&self, lsblk_output: &str) -> Result<String, ProvisionError>;
}

/// Selects the last `disk` row, assuming the most recently attached volume is
/// enumerated after the root and boot disks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastDiskVolume;

impl VolumeSelector for LastDiskVolume {
    fn select(&self, lsblk_output: &str) -> Result<String, ProvisionError> {
        extract_last_volume_name(lsblk_output)
    }
}

/// Returns the NAME of the last row whose TYPE column is `disk`. Rows with
/// fewer than three columns are skipped.
pub fn extract_last_volume_name(lsblk_output: &str) -> Result<String, ProvisionError> {
    lsblk_output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, _size, "disk", ..] => Some(*name),
                _ => None,
            }
        })
        .last()
        .map(str::to_string)
        .ok_or(ProvisionError::NoDiskVolume)
}

/// Device name of the first partition, e.g. `nvme1n1p1` or `xvdb1`.
pub fn first_partition_name(volume: &str) -> String {
    if volume.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{volume}p1")
    } else {
        format!("{volume}1")
    }
}
