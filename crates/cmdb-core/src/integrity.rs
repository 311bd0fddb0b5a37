//! Relationship integrity
//!
//! A proposed edge `source -> target` of some type conflicts when an active
//! edge `target -> source` of the same type is already stored. Only that
//! direct reversal is detected: longer cycles, edges of other types and
//! inactive edges are ignored.
//!
//! The check and the later insert are separate store calls with no
//! transaction around them, so two concurrent writers proposing opposite
//! edges may both pass.

use uuid::Uuid;

use crate::store::{RelationshipRepository, StoreResult};

pub const INTEGRITY_CONFLICT_MESSAGE: &str =
    "A conflicting relationship already exists in the opposite direction";

/// Whether creating `source -> target` of `relationship_type` would directly
/// contradict an active edge. Store failures propagate unchanged.
pub async fn would_conflict(
    relationships: &dyn RelationshipRepository,
    source_id: Uuid,
    target_id: Uuid,
    relationship_type: &str,
) -> StoreResult<bool> {
    let reverse = relationships
        .find_active_relationship(target_id, source_id, relationship_type)
        .await?;
    Ok(reverse.is_some())
}
