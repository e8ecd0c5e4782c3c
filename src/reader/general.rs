// Helpers shared across domain readers: the requesting-user lookup (with
// the `"me"` shorthand resolved first) and the access-control gate every
// reader runs before handing back a record.

use crate::backend::Backends;
use crate::error::QueryError;
use crate::types::{DatasetId, EntryId, UploadId, UserId};

/// Resolve a `user_id` that may be the literal `"me"` shorthand against the
/// requesting user, then fetch that user's record.
pub async fn retrieve_user(
    backends: &Backends,
    requester: &UserId,
    user_id: &UserId,
) -> Result<serde_json::Value, QueryError> {
    let resolved = user_id.resolve(requester);
    backends.documents.get_user(&resolved).await
}

pub async fn require_upload_access(
    backends: &Backends,
    requester: &UserId,
    upload_id: &UploadId,
    reference: &str,
) -> Result<(), QueryError> {
    let allowed = backends.access.can_view_upload(requester, upload_id).await?;
    if allowed {
        Ok(())
    } else {
        Err(QueryError::no_access(reference, "requester may not view this upload"))
    }
}

pub async fn require_entry_access(
    backends: &Backends,
    requester: &UserId,
    entry_id: &EntryId,
    reference: &str,
) -> Result<(), QueryError> {
    let allowed = backends.access.can_view_entry(requester, entry_id).await?;
    if allowed {
        Ok(())
    } else {
        Err(QueryError::no_access(reference, "requester may not view this entry"))
    }
}

pub async fn require_dataset_access(
    backends: &Backends,
    requester: &UserId,
    dataset_id: &DatasetId,
    reference: &str,
) -> Result<(), QueryError> {
    let allowed = backends
        .access
        .can_view_dataset(requester, dataset_id)
        .await?;
    if allowed {
        Ok(())
    } else {
        Err(QueryError::no_access(reference, "requester may not view this dataset"))
    }
}
