use strata_types::UserId;

use crate::error::{AccessError, AccessResult, DenyCode};
use crate::principal::Principal;
use crate::rule::{AclRule, AclSet, Privilege};

/// The rule context for one node, resolved by the tree layer.
#[derive(Clone, Debug, Default)]
pub struct AclContext<'a> {
    /// The node's owner.
    pub owner: Option<&'a UserId>,
    /// The node's own rule set (non-empty means the node is a share root).
    pub own_rules: Option<&'a AclSet>,
    /// Rules inherited from the nearest ancestor that is a share root.
    /// `None` when no ancestor is shared or the node is itself a share root.
    pub inherited_rules: Option<&'a AclSet>,
}

/// Stateless ACL evaluator.
///
/// Evaluation order: ownership, then explicit per-node rules (user rules
/// before group rules), then inherited share-root rules. The first
/// matching explicit rule wins; no match denies by default.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessControl;

impl AccessControl {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate whether `principal` holds `requested` on the node described
    /// by `ctx`.
    pub fn is_allowed(
        &self,
        principal: &Principal,
        ctx: &AclContext<'_>,
        requested: Privilege,
    ) -> bool {
        if principal.admin {
            return true;
        }
        if let Some(owner) = ctx.owner {
            if principal.owns(owner) {
                return true;
            }
        }
        match self.first_match(principal, ctx) {
            Some(rule) => rule.privilege.allows(requested),
            None => false,
        }
    }

    /// Same evaluation as [`is_allowed`](Self::is_allowed), failing
    /// `Forbidden` with a stable sub-code on denial.
    pub fn assert_allowed(
        &self,
        principal: &Principal,
        ctx: &AclContext<'_>,
        requested: Privilege,
    ) -> AccessResult<()> {
        if self.is_allowed(principal, ctx, requested) {
            return Ok(());
        }
        let code = match requested {
            Privilege::ReadWrite => DenyCode::NotAllowedToModify,
            _ => DenyCode::NotAllowedToAccess,
        };
        Err(AccessError::forbidden(
            code,
            format!("principal {} lacks {requested:?} privilege", principal.user),
        ))
    }

    /// Fail unless the principal is administrative.
    pub fn assert_admin(&self, principal: &Principal) -> AccessResult<()> {
        if principal.admin {
            Ok(())
        } else {
            Err(AccessError::forbidden(
                DenyCode::AdminRequired,
                "admin privileges required",
            ))
        }
    }

    /// The first explicit rule matching the principal: user rules before
    /// group rules, own rules before inherited rules.
    fn first_match<'a>(
        &self,
        principal: &Principal,
        ctx: &'a AclContext<'_>,
    ) -> Option<&'a AclRule> {
        for set in [ctx.own_rules, ctx.inherited_rules].into_iter().flatten() {
            if let Some(rule) = set.first_user_match(&principal.user) {
                return Some(rule);
            }
            if let Some(rule) = set.first_group_match(&principal.groups) {
                return Some(rule);
            }
        }
        None
    }
}
