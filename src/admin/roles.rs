/// Role model shared by the authorization gate and the workflows
use crate::error::{KbError, KbResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account roles. Membership is exact: holding one never implies another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Every registered account
    User,
    /// May author solutions
    Admin,
    /// Reviews solutions and processes admin applications
    Developer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::Developer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Developer => "developer",
        }
    }

    pub fn from_str(s: &str) -> KbResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "developer" => Ok(Role::Developer),
            _ => Err(KbError::Validation(format!("Invalid role: {}", s))),
        }
    }

    fn bit(self) -> u8 {
        match self {
            Role::User => 0b001,
            Role::Admin => 0b010,
            Role::Developer => 0b100,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small bitset of roles held by one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub fn empty() -> Self {
        RoleSet(0)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= role.bit();
    }

    pub fn remove(&mut self, role: Role) {
        self.0 &= !role.bit();
    }

    pub fn with(mut self, role: Role) -> Self {
        self.insert(role);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::empty();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl Serialize for RoleSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(roles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("DEVELOPER").unwrap(), Role::Developer);

        assert!(Role::from_str("superadmin").is_err());
    }

    #[test]
    fn test_membership_is_exact() {
        let set = RoleSet::empty().with(Role::User).with(Role::Developer);

        assert!(set.contains(Role::User));
        assert!(set.contains(Role::Developer));
        assert!(!set.contains(Role::Admin));
    }

    #[test]
    fn test_insert_remove() {
        let mut set = RoleSet::empty();
        assert!(set.is_empty());

        set.insert(Role::Admin);
        set.insert(Role::Admin);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Role::Admin]);

        set.remove(Role::Admin);
        assert!(set.is_empty());
    }

    #[test]
    fn test_serializes_as_role_names() {
        let set: RoleSet = [Role::Developer, Role::User].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["user","developer"]"#);

        let back: RoleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
