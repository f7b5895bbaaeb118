//! crates/pressroom_core/src/access.rs
//!
//! The access-control evaluator: a pure predicate deciding whether an actor
//! may perform an action on an article. Callers must consult it before
//! every ledger mutation; it has no side effects of its own.

use crate::domain::{Actor, Article, ArticleStatus, Visibility};

/// Actions an actor can attempt on an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Read,
    Write,
    Vote,
    Save,
    Comment,
    Approve,
}

/// Decides whether `actor` may perform `action` on `article`.
///
/// Interaction (vote/save/comment) is allowed exactly where reading is:
/// anyone who can see an article can engage with it, including public
/// articles outside the actor's own accounts.
pub fn can_access(actor: &Actor, article: &Article, action: AccessAction) -> bool {
    match action {
        AccessAction::Read | AccessAction::Vote | AccessAction::Save | AccessAction::Comment => {
            can_read(actor, article)
        }
        AccessAction::Write => can_write(actor, article),
        AccessAction::Approve => actor.is_global_admin,
    }
}

/// The read rule, an ordered decision table. The first matching row wins,
/// so a private article in `pending_approval` stays readable by account
/// members while an account-visible one is creator/global-admin only.
fn can_read(actor: &Actor, article: &Article) -> bool {
    let is_creator = actor.user_id == Some(article.created_by);
    let is_member = actor.is_member_of(article.account_id);

    match (article.visibility, article.status) {
        (Visibility::Public, ArticleStatus::Published) => true,
        (Visibility::Account, ArticleStatus::Published) => !actor.is_anonymous(),
        (Visibility::Private, _) => is_creator || is_member,
        (_, ArticleStatus::Draft) => is_creator || is_member,
        (_, ArticleStatus::PendingApproval) => is_creator || actor.is_global_admin,
        _ => false,
    }
}

/// The write rule: the creator (while still holding at least member role
/// in the account), or any account owner/admin.
fn can_write(actor: &Actor, article: &Article) -> bool {
    let Some(user_id) = actor.user_id else {
        return false;
    };
    let Some(role) = actor.role_in(article.account_id) else {
        return false;
    };
    user_id == article.created_by || role.can_manage()
}
