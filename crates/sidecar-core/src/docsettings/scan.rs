//! Candidate discovery and freshness ordering.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use strum::AsRefStr;

/// Where a candidate file lives, independent of primary/backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StorageLocation {
    InPlace,
    LegacyInPlace,
    Centralized,
    LegacyHistory,
    LegacyKpdfview,
}

/// One legal place a sidecar file could be, in canonical preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSlot {
    pub path: PathBuf,
    pub location: StorageLocation,
    pub backup: bool,
}

/// An existing sidecar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarCandidate {
    pub path: PathBuf,
    /// Effective modification time, after the backup clamp.
    pub mtime: SystemTime,
    /// Position of the slot in the preference list; lower wins ties.
    pub priority: usize,
    pub location: StorageLocation,
    pub backup: bool,
}

impl SidecarCandidate {
    /// Label such as `in_place` or `centralized.old`.
    pub fn label(&self) -> String {
        if self.backup {
            format!("{}.old", self.location.as_ref())
        } else {
            self.location.as_ref().to_string()
        }
    }
}

/// Order the existing slots by freshness.
///
/// Slots that are not regular files are dropped. A backup slot directly
/// following its existing primary shares one mtime with it, the newer of
/// the two, so the pair stays adjacent and the primary wins the tie even
/// when the clock that stamped it was behind. The result is sorted by
/// mtime descending, then slot position.
pub fn scan(slots: &[CandidateSlot]) -> Vec<SidecarCandidate> {
    let mut found: Vec<SidecarCandidate> = Vec::with_capacity(slots.len());
    // (position, location, mtime) of the previous slot if it exists as a primary
    let mut previous_primary: Option<(usize, StorageLocation, SystemTime)> = None;

    for (priority, slot) in slots.iter().enumerate() {
        let Some(mut mtime) = regular_file_mtime(slot) else {
            previous_primary = None;
            continue;
        };

        if slot.backup
            && let Some((prev_pos, prev_location, prev_mtime)) = previous_primary
            && prev_pos + 1 == priority
            && prev_location == slot.location
        {
            let pair_mtime = mtime.max(prev_mtime);
            if let Some(primary) = found.last_mut() {
                primary.mtime = pair_mtime;
            }
            mtime = pair_mtime;
        }

        previous_primary = (!slot.backup).then_some((priority, slot.location, mtime));
        found.push(SidecarCandidate {
            path: slot.path.clone(),
            mtime,
            priority,
            location: slot.location,
            backup: slot.backup,
        });
    }

    found.sort_by(|a, b| {
        b.mtime
            .cmp(&a.mtime)
            .then_with(|| a.priority.cmp(&b.priority))
    });
    found
}

fn regular_file_mtime(slot: &CandidateSlot) -> Option<SystemTime> {
    let metadata = fs::metadata(&slot.path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(metadata.modified().unwrap_or(UNIX_EPOCH))
}
