// Cleanup Jobs - retention-based deletion of check history

use crate::Result;
use crate::db::traits::TargetRepository;
use chrono::Utc;

/// Delete `repository` history older than `retention`.
///
/// `label` names the rows for logging, e.g. "cert checks".
pub async fn remove_expired_history<R>(
    label: &str,
    repository: &R,
    retention: chrono::Duration,
) -> Result<u64>
where
    R: TargetRepository + ?Sized,
{
    let cutoff = Utc::now() - retention;
    let removed = repository.delete_older_than(cutoff).await?;

    tracing::info!("Removed {} {}", removed, label);

    Ok(removed)
}
