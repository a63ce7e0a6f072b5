//! Key declarations and their compiled-model counterparts.

use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::model::{EntityId, KeyId, MemberId};

/// Bit-set over key roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Archive, Serialize, Deserialize)]
pub struct KeyType(u8);

impl KeyType {
    /// No role.
    pub const NONE: KeyType = KeyType(0);
    /// Primary key.
    pub const PRIMARY_KEY: KeyType = KeyType(1);
    /// Foreign key.
    pub const FOREIGN_KEY: KeyType = KeyType(1 << 1);
    /// Physical index.
    pub const INDEX: KeyType = KeyType(1 << 2);
    /// Values are unique.
    pub const UNIQUE: KeyType = KeyType(1 << 3);
    /// Clustered storage order.
    pub const CLUSTERED: KeyType = KeyType(1 << 4);
    /// Unique index.
    pub const UNIQUE_INDEX: KeyType = KeyType(Self::INDEX.0 | Self::UNIQUE.0);
    /// Clustered index.
    pub const CLUSTERED_INDEX: KeyType = KeyType(Self::INDEX.0 | Self::CLUSTERED.0);

    /// Check if every role in `other` is set.
    pub const fn contains(self, other: KeyType) -> bool {
        self.0 & other.0 == other.0
    }

    /// The roles of `self` not in `other`.
    pub const fn without(self, other: KeyType) -> KeyType {
        KeyType(self.0 & !other.0)
    }

    /// Check if this is a primary key.
    pub const fn is_primary_key(self) -> bool {
        self.contains(Self::PRIMARY_KEY)
    }

    /// Check if this is a foreign key.
    pub const fn is_foreign_key(self) -> bool {
        self.contains(Self::FOREIGN_KEY)
    }

    /// Check if this key is materialized as an index of some kind.
    pub const fn is_index(self) -> bool {
        self.0 & (Self::INDEX.0 | Self::PRIMARY_KEY.0 | Self::UNIQUE.0) != 0
    }

    /// Check if values are unique.
    pub const fn is_unique(self) -> bool {
        self.contains(Self::UNIQUE) || self.is_primary_key()
    }

    /// Check if this key is clustered.
    pub const fn is_clustered(self) -> bool {
        self.contains(Self::CLUSTERED)
    }
}

impl BitOr for KeyType {
    type Output = KeyType;

    fn bitor(self, rhs: KeyType) -> KeyType {
        KeyType(self.0 | rhs.0)
    }
}

impl BitOrAssign for KeyType {
    fn bitor_assign(&mut self, rhs: KeyType) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::PRIMARY_KEY, "PrimaryKey"),
            (Self::FOREIGN_KEY, "ForeignKey"),
            (Self::INDEX, "Index"),
            (Self::UNIQUE, "Unique"),
            (Self::CLUSTERED, "Clustered"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(k, _)| self.contains(*k))
            .map(|(_, n)| *n)
            .collect();
        if set.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&set.join("|"))
        }
    }
}

/// A key declaration within an entity.
///
/// Members are order specs: a member name, optionally followed by `:DESC`,
/// `:ASC`, ` DESC` or ` ASC`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct KeyDecl {
    /// Key roles.
    pub key_type: KeyType,
    /// Member order specs.
    pub members: Vec<String>,
    /// Explicit name.
    pub name: Option<String>,
    /// Non-key covering members.
    pub include: Vec<String>,
    /// Filter predicate SQL.
    pub filter: Option<String>,
}

impl KeyDecl {
    /// Create a key over the given member specs.
    pub fn new(key_type: KeyType, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key_type,
            members: members.into_iter().map(Into::into).collect(),
            name: None,
            include: Vec::new(),
            filter: None,
        }
    }

    /// Create a primary key.
    pub fn primary_key(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(KeyType::PRIMARY_KEY, members)
    }

    /// Create a non-unique index.
    pub fn index(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(KeyType::INDEX, members)
    }

    /// Create a unique index.
    pub fn unique(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(KeyType::UNIQUE_INDEX, members)
    }

    /// Create a key from a comma-separated member spec, e.g. `"LastName, FirstName:DESC"`.
    pub fn parse(key_type: KeyType, spec: &str) -> Self {
        Self::new(
            key_type,
            spec.split(',').map(str::trim).filter(|s| !s.is_empty()),
        )
    }

    /// Add the clustered role.
    pub fn clustered(mut self) -> Self {
        self.key_type |= KeyType::CLUSTERED;
        self
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the include members.
    pub fn with_include(mut self, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = members.into_iter().map(Into::into).collect();
        self
    }

    /// Set the filter predicate.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Parse one member order spec into `(name, descending)`.
pub fn parse_order_spec(spec: &str) -> Result<(String, bool), String> {
    let spec = spec.trim();
    let (name, direction) = match spec.split_once(':') {
        Some((name, dir)) => (name.trim(), Some(dir.trim())),
        None => match spec.split_once(char::is_whitespace) {
            Some((name, dir)) => (name.trim(), Some(dir.trim())),
            None => (spec, None),
        },
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid member name in key spec '{spec}'"));
    }

    let desc = match direction.map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => {
            return Err(format!(
                "invalid sort direction '{other}' in key spec '{spec}'"
            ))
        }
    };

    Ok((name.to_string(), desc))
}

/// Expansion progress of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    /// Not yet visited.
    Unexpanded,
    /// On the expansion stack.
    Expanding,
    /// Expanded members are all columns.
    Expanded,
    /// Expansion failed; errors were reported.
    Failed,
}

/// A key member with its sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyMember {
    /// Member.
    pub member: MemberId,
    /// Descending order.
    pub desc: bool,
}

impl KeyMember {
    /// Ascending key member.
    pub fn asc(member: MemberId) -> Self {
        Self {
            member,
            desc: false,
        }
    }
}

/// A key in the compiled entity model.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Key id.
    pub id: KeyId,
    /// Owning entity.
    pub entity: EntityId,
    /// Roles.
    pub key_type: KeyType,
    /// Explicit name.
    pub name: Option<String>,
    /// Members as declared; may include entity references.
    pub members: Vec<KeyMember>,
    /// Members with references replaced by their columns.
    pub expanded: Vec<KeyMember>,
    /// Covering members as declared.
    pub include: Vec<MemberId>,
    /// Covering members expanded to columns.
    pub expanded_include: Vec<MemberId>,
    /// Filter predicate SQL.
    pub filter: Option<String>,
    /// Reference member owning a foreign key.
    pub owner_member: Option<MemberId>,
    /// Expansion progress.
    pub state: ExpansionState,
}

impl KeyInfo {
    /// Create an unexpanded key.
    pub fn new(id: KeyId, entity: EntityId, key_type: KeyType, members: Vec<KeyMember>) -> Self {
        Self {
            id,
            entity,
            key_type,
            name: None,
            members,
            expanded: Vec::new(),
            include: Vec::new(),
            expanded_include: Vec::new(),
            filter: None,
            owner_member: None,
            state: ExpansionState::Unexpanded,
        }
    }

    /// Check if expansion completed.
    pub fn is_expanded(&self) -> bool {
        self.state == ExpansionState::Expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_bits() {
        let kt = KeyType::UNIQUE_INDEX | KeyType::CLUSTERED;
        assert!(kt.is_index());
        assert!(kt.is_unique());
        assert!(kt.is_clustered());
        assert!(!kt.is_primary_key());
        assert_eq!(kt.to_string(), "Index|Unique|Clustered");

        assert!(KeyType::PRIMARY_KEY.is_unique());
        assert!(!KeyType::FOREIGN_KEY.is_index());
        assert_eq!(KeyType::NONE.to_string(), "None");
        assert_eq!(kt.without(KeyType::CLUSTERED), KeyType::UNIQUE_INDEX);
    }

    #[test]
    fn test_parse_order_spec() {
        assert_eq!(parse_order_spec("Title").unwrap(), ("Title".into(), false));
        assert_eq!(parse_order_spec("Title:DESC").unwrap(), ("Title".into(), true));
        assert_eq!(parse_order_spec(" Title asc ").unwrap(), ("Title".into(), false));
        assert_eq!(parse_order_spec("Title desc").unwrap(), ("Title".into(), true));
        assert!(parse_order_spec("Title:sideways").is_err());
        assert!(parse_order_spec(":desc").is_err());
        assert!(parse_order_spec("Ti-tle").is_err());
    }

    #[test]
    fn test_key_decl_parse() {
        let key = KeyDecl::parse(KeyType::INDEX, "LastName, FirstName:DESC,")
            .clustered()
            .with_include(["Email"]);

        assert_eq!(key.members, vec!["LastName", "FirstName:DESC"]);
        assert!(key.key_type.is_clustered());
        assert_eq!(key.include, vec!["Email"]);
    }
}
