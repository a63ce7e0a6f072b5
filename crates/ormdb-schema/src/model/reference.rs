//! Links between entities.

use super::model::{EntityId, KeyId, MemberId};

/// Resolved details of an entity reference member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInfo {
    /// Referenced entity.
    pub target: EntityId,
    /// Foreign key in the referencing entity.
    pub from_key: KeyId,
    /// Primary key of the referenced entity.
    pub to_key: KeyId,
    /// Deleting the referenced row deletes the referencing row.
    pub cascade_delete: bool,
}

/// Resolved details of an entity list member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListInfo {
    /// Entity whose rows make up the list.
    pub target: EntityId,
    /// Reference member on the target pointing back to the list owner.
    pub inverse: MemberId,
}

impl ReferenceInfo {
    /// Check if this reference points at its own entity.
    pub fn is_self_reference(&self, owner: EntityId) -> bool {
        self.target == owner
    }
}
