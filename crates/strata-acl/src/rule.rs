use serde::{Deserialize, Serialize};
use strata_types::{GroupId, UserId};

/// Privilege granted (or withheld) by an ACL rule.
///
/// Ordered from weakest to strongest; `allows` compares against the
/// requested privilege. `Deny` is an explicit block that wins over any
/// later rule because evaluation is first-match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Privilege {
    /// Explicitly blocks the matched principal.
    Deny,
    /// Read-only access.
    Read,
    /// Read and write access.
    ReadWrite,
}

impl Privilege {
    /// Returns `true` if a rule granting `self` satisfies a request for
    /// `requested`.
    pub fn allows(&self, requested: Privilege) -> bool {
        match self {
            Self::Deny => false,
            granted => *granted >= requested,
        }
    }
}

/// The principal a rule applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "principal", rename_all = "lowercase")]
pub enum RuleSubject {
    /// A single user.
    User(UserId),
    /// Every member of a group.
    Group(GroupId),
}

impl RuleSubject {
    /// Returns `true` for user-type subjects.
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// One access-control rule: a subject and the privilege it is granted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    pub subject: RuleSubject,
    pub privilege: Privilege,
}

impl AclRule {
    pub fn user(user: impl Into<UserId>, privilege: Privilege) -> Self {
        Self {
            subject: RuleSubject::User(user.into()),
            privilege,
        }
    }

    pub fn group(group: impl Into<GroupId>, privilege: Privilege) -> Self {
        Self {
            subject: RuleSubject::Group(group.into()),
            privilege,
        }
    }
}

/// An ordered list of ACL rules attached to a node.
///
/// A node with a non-empty set is a share root. Order is significant: the
/// first matching rule wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AclSet(Vec<AclRule>);

impl AclSet {
    /// An empty rule set (the node is private).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from an ordered rule list.
    pub fn from_rules(rules: Vec<AclRule>) -> Self {
        Self(rules)
    }

    /// Returns `true` if no rules are attached (node is not a share root).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[AclRule] {
        &self.0
    }

    /// Append a rule at the end of the evaluation order.
    pub fn push(&mut self, rule: AclRule) {
        self.0.push(rule);
    }

    /// First rule whose user subject matches, in order.
    pub fn first_user_match(&self, user: &UserId) -> Option<&AclRule> {
        self.0
            .iter()
            .find(|r| matches!(&r.subject, RuleSubject::User(u) if u == user))
    }

    /// First rule whose group subject is among the given memberships, in
    /// order.
    pub fn first_group_match(&self, groups: &[GroupId]) -> Option<&AclRule> {
        self.0
            .iter()
            .find(|r| matches!(&r.subject, RuleSubject::Group(g) if groups.contains(g)))
    }
}
