//! Credential files in the remote archive: naming, lookup, and duplicate cleanup.
//!
//! Files are named `creds_<number>_<epoch_ms>.json`. Several files may exist
//! for one number after repeated logins; only the newest is kept.

mod github;


pub use github::GithubArchive;

use beacon_core::{
    error::BeaconError,
    message::normalize_number,
    traits::{ArchiveEntry, Credentials, SessionArchive},
};
use tracing::{debug, info, warn};

const CREDS_PREFIX: &str = "creds_";
const CREDS_SUFFIX: &str = ".json";

/// Archive file name for `number` created at `created_at` (epoch ms).
pub fn creds_file_name(number: &str, created_at: i64) -> String {
    format!(
        "{CREDS_PREFIX}{}_{created_at}{CREDS_SUFFIX}",
        normalize_number(number)
    )
}

/// Split `creds_<number>_<timestamp>.json` into its number and timestamp.
pub fn parse_creds_name(name: &str) -> Option<(String, i64)> {
    let stem = name.strip_prefix(CREDS_PREFIX)?.strip_suffix(CREDS_SUFFIX)?;
    let (number, timestamp) = stem.rsplit_once('_')?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let timestamp = timestamp.parse::<i64>().ok()?;
    Some((number.to_string(), timestamp))
}

/// Entries belonging to `number`, newest first.
pub fn entries_for(entries: &[ArchiveEntry], number: &str) -> Vec<(ArchiveEntry, i64)> {
    let wanted = normalize_number(number);
    let mut matching: Vec<(ArchiveEntry, i64)> = entries
        .iter()
        .filter_map(|entry| {
            let (owner, ts) = parse_creds_name(&entry.name)?;
            (owner == wanted).then(|| (entry.clone(), ts))
        })
        .collect();
    matching.sort_by(|a, b| b.1.cmp(&a.1));
    matching
}

/// Split `number`'s files into the one to keep (newest) and the ones to delete.
pub fn plan_cleanup(
    entries: &[ArchiveEntry],
    number: &str,
) -> (Option<ArchiveEntry>, Vec<ArchiveEntry>) {
    let mut ordered = entries_for(entries, number).into_iter().map(|(e, _)| e);
    let keep = ordered.next();
    (keep, ordered.collect())
}

/// Delete every credential file for `number` except the newest.
///
/// Individual delete failures are logged and skipped. Returns what was deleted.
pub async fn cleanup_duplicates(
    archive: &dyn SessionArchive,
    number: &str,
) -> Result<Vec<ArchiveEntry>, BeaconError> {
    let entries = archive.list().await?;
    let (keep, stale) = plan_cleanup(&entries, number);

    let mut deleted = Vec::with_capacity(stale.len());
    for entry in stale {
        match archive.delete(&entry).await {
            Ok(()) => {
                debug!(number, "deleted duplicate credentials {}", entry.name);
                deleted.push(entry);
            }
            Err(e) => warn!(number, "failed to delete {}: {e}", entry.name),
        }
    }

    if !deleted.is_empty() {
        info!(
            number,
            "removed {} duplicate credential file(s), kept {}",
            deleted.len(),
            keep.map(|k| k.name).unwrap_or_default()
        );
    }
    Ok(deleted)
}

/// Newest credentials for `number`, or `None` when the archive has none.
pub async fn latest_credentials(
    archive: &dyn SessionArchive,
    number: &str,
) -> Result<Option<Credentials>, BeaconError> {
    let entries = archive.list().await?;
    let Some((entry, created_at)) = entries_for(&entries, number).into_iter().next() else {
        return Ok(None);
    };

    let data = archive.fetch(&entry).await?;
    if data.is_empty() {
        return Err(BeaconError::Archive(format!("{} is empty", entry.name)));
    }
    Ok(Some(Credentials {
        number: normalize_number(number),
        created_at,
        data,
    }))
}

/// Upload a fresh credential file for `number`. Returns the file name.
pub async fn store_credentials(
    archive: &dyn SessionArchive,
    number: &str,
    data: &[u8],
    created_at: i64,
) -> Result<String, BeaconError> {
    let name = creds_file_name(number, created_at);
    archive.upload(&name, data).await?;
    debug!(number, "uploaded credentials {name}");
    Ok(name)
}
