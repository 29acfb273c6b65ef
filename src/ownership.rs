/// Ownership predicate for deletes.
///
/// Always evaluated against the live session identity; nothing about
/// ownership is ever stored on the record.

use crate::state::{Identity, Tree};

/// True if the current identity may delete `record`
pub fn is_owner(record: &Tree, identity: &Identity) -> bool {
    let same_user = match (record.user_id.as_deref(), identity.user_id.as_deref()) {
        (Some(owner), Some(current)) => !current.is_empty() && owner == current,
        _ => false,
    };

    let same_name = match (record.uploaded_by.as_deref(), identity.display_name.as_deref()) {
        (Some(owner), Some(current)) => !current.is_empty() && owner == current,
        _ => false,
    };

    same_user || same_name
}
