use serde::{Deserialize, Serialize};
use strata_types::{GroupId, UserId};

/// An authenticated principal, as supplied by the external identity
/// provider. The core never authenticates; it only evaluates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The user identifier.
    pub user: UserId,
    /// Group memberships, resolved by the identity provider.
    pub groups: Vec<GroupId>,
    /// Administrative principals bypass ACL evaluation entirely.
    pub admin: bool,
}

impl Principal {
    /// A plain user with no group memberships.
    pub fn user(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            groups: Vec::new(),
            admin: false,
        }
    }

    /// An administrative principal.
    pub fn admin(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            groups: Vec::new(),
            admin: true,
        }
    }

    /// Attach group memberships.
    pub fn with_groups(mut self, groups: Vec<GroupId>) -> Self {
        self.groups = groups;
        self
    }

    /// Returns `true` if this principal is the given owner.
    pub fn owns(&self, owner: &UserId) -> bool {
        &self.user == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_check() {
        let p = Principal::user("alice");
        assert!(p.owns(&UserId::from("alice")));
        assert!(!p.owns(&UserId::from("bob")));
    }

    #[test]
    fn admin_flag() {
        assert!(Principal::admin("root").admin);
        assert!(!Principal::user("alice").admin);
    }

    #[test]
    fn groups_attach() {
        let p = Principal::user("alice").with_groups(vec![GroupId::from("staff")]);
        assert_eq!(p.groups.len(), 1);
    }
}
