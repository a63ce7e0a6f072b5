//! Entity metadata model.
//!
//! Declarations (`*Decl`) are the plain-data input assembled before
//! compilation. [`EntityModel`] is the arena built from them, which key
//! expansion and dependency analysis mutate in place.

mod bundle;
mod entity;
mod key;
mod member;
#[allow(clippy::module_inception)]
mod model;
mod reference;

pub use bundle::ModelDecl;
pub use entity::{EntityDecl, EntityFlags, EntityInfo, EntityKind};
pub use key::{parse_order_spec, ExpansionState, KeyDecl, KeyInfo, KeyMember, KeyType};
pub use member::{
    ComputedColumn, ComputedKind, MemberDecl, MemberFlags, MemberInfo, MemberKind,
    MemberTypeDecl, TABLE_PLACEHOLDER,
};
pub use model::{EntityId, EntityModel, KeyId, MemberId};
pub use reference::{ListInfo, ReferenceInfo};
