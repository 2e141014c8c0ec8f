//! Attachment metadata copy
//!
//! Attachment records are flat: the only change is the `trashDocIds` ->
//! `archivedDocIds` rename.

use futures::TryStreamExt;
use tracing::info;

use crate::db::{LegacySource, TargetStore};
use crate::types::{JsonMap, Result};

const LEGACY_TRASH_FIELD: &str = "trashDocIds";
const ARCHIVED_FIELD: &str = "archivedDocIds";

pub fn upgrade_attachment(mut attachment: JsonMap) -> JsonMap {
    if let Some(ids) = attachment.remove(LEGACY_TRASH_FIELD) {
        attachment.insert(ARCHIVED_FIELD.into(), ids);
    }
    attachment
}

/// Copy every attachment record; returns the number copied
pub async fn copy_attachments(source: &dyn LegacySource, target: &dyn TargetStore) -> Result<usize> {
    let mut copied = 0;
    let mut attachments = source.attachments().await?;
    while let Some(attachment) = attachments.try_next().await? {
        target.insert_attachment(upgrade_attachment(attachment)).await?;
        copied += 1;
    }
    info!(copied, "Attachments copied");
    Ok(copied)
}
