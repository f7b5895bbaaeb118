//! crates/pressroom_core/src/workflow.rs
//!
//! The approval state machine: draft -> pending_approval -> published,
//! with rejection returning to draft. Transitions are explicit functions
//! that produce the complete set of workflow fields for the store to
//! write, so approval metadata is never left half-set.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Article, ArticleStatus, Visibility};

/// Returned when a transition is attempted out of order.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot {action} an article in status '{}'", from.as_str())]
pub struct InvalidTransition {
    pub from: ArticleStatus,
    pub action: &'static str,
}

/// The full workflow field-set after a transition. Stores write every
/// field, keeping the approval metadata consistent as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalUpdate {
    pub status: ArticleStatus,
    pub visibility: Visibility,
    pub publish_date: Option<DateTime<Utc>>,
    pub submitted_for_approval_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Creator sends a draft off for review. Clears any approval or
/// rejection metadata left over from a previous cycle.
pub fn submit(article: &Article, now: DateTime<Utc>) -> Result<ApprovalUpdate, InvalidTransition> {
    if article.status != ArticleStatus::Draft {
        return Err(InvalidTransition {
            from: article.status,
            action: "submit",
        });
    }
    Ok(ApprovalUpdate {
        status: ArticleStatus::PendingApproval,
        visibility: article.visibility,
        publish_date: article.publish_date,
        submitted_for_approval_at: Some(now),
        approved_by: None,
        approved_at: None,
        rejection_reason: None,
    })
}

/// Admin publishes a pending article: public visibility, publish date
/// stamped, approval recorded, any rejection reason cleared.
pub fn approve(
    article: &Article,
    admin_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ApprovalUpdate, InvalidTransition> {
    if article.status != ArticleStatus::PendingApproval {
        return Err(InvalidTransition {
            from: article.status,
            action: "approve",
        });
    }
    Ok(ApprovalUpdate {
        status: ArticleStatus::Published,
        visibility: Visibility::Public,
        publish_date: Some(now),
        submitted_for_approval_at: article.submitted_for_approval_at,
        approved_by: Some(admin_id),
        approved_at: Some(now),
        rejection_reason: None,
    })
}

/// Admin sends a pending article back to draft, optionally with a reason.
/// There is no separate rejected state; a rejected article can be revised
/// and resubmitted indefinitely.
pub fn reject(
    article: &Article,
    reason: Option<String>,
) -> Result<ApprovalUpdate, InvalidTransition> {
    if article.status != ArticleStatus::PendingApproval {
        return Err(InvalidTransition {
            from: article.status,
            action: "reject",
        });
    }
    Ok(ApprovalUpdate {
        status: ArticleStatus::Draft,
        visibility: Visibility::Account,
        publish_date: article.publish_date,
        submitted_for_approval_at: article.submitted_for_approval_at,
        approved_by: None,
        approved_at: None,
        rejection_reason: reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(status: ArticleStatus) -> Article {
        let now = Utc::now();
        Article {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: "t".into(),
            subtitle: String::new(),
            body: String::new(),
            category: "news".into(),
            tags: Vec::new(),
            status,
            visibility: Visibility::Account,
            upvotes: 0,
            downvotes: 0,
            vote_score: 0,
            trend_score: 0.0,
            is_trending: false,
            total_views: 0,
            unique_views: 0,
            total_shares: 0,
            total_saves: 0,
            total_comments: 0,
            avg_read_time: 0.0,
            bounce_rate: 0.0,
            engagement: 0.0,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            submitted_for_approval_at: None,
            publish_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn submit_only_from_draft() {
        let now = Utc::now();
        let update = submit(&article(ArticleStatus::Draft), now).unwrap();
        assert_eq!(update.status, ArticleStatus::PendingApproval);
        assert_eq!(update.submitted_for_approval_at, Some(now));
        assert!(update.approved_by.is_none() && update.approved_at.is_none());

        for status in [
            ArticleStatus::PendingApproval,
            ArticleStatus::Published,
            ArticleStatus::Archived,
        ] {
            assert!(submit(&article(status), now).is_err());
        }
    }

    #[test]
    fn submit_clears_prior_rejection() {
        let mut a = article(ArticleStatus::Draft);
        a.rejection_reason = Some("needs sources".into());
        let update = submit(&a, Utc::now()).unwrap();
        assert!(update.rejection_reason.is_none());
    }

    #[test]
    fn approve_publishes_and_stamps_metadata() {
        let admin = Uuid::new_v4();
        let now = Utc::now();
        let mut a = article(ArticleStatus::PendingApproval);
        a.rejection_reason = Some("stale".into());

        let update = approve(&a, admin, now).unwrap();
        assert_eq!(update.status, ArticleStatus::Published);
        assert_eq!(update.visibility, Visibility::Public);
        assert_eq!(update.publish_date, Some(now));
        assert_eq!(update.approved_by, Some(admin));
        assert_eq!(update.approved_at, Some(now));
        assert!(update.rejection_reason.is_none());
    }

    #[test]
    fn approve_requires_pending() {
        assert!(approve(&article(ArticleStatus::Draft), Uuid::new_v4(), Utc::now()).is_err());
        assert!(approve(&article(ArticleStatus::Published), Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn reject_returns_to_draft_with_reason() {
        let update = reject(
            &article(ArticleStatus::PendingApproval),
            Some("too short".into()),
        )
        .unwrap();
        assert_eq!(update.status, ArticleStatus::Draft);
        assert_eq!(update.visibility, Visibility::Account);
        assert_eq!(update.rejection_reason.as_deref(), Some("too short"));
        assert!(update.approved_by.is_none() && update.approved_at.is_none());
    }

    #[test]
    fn reject_requires_pending() {
        assert!(reject(&article(ArticleStatus::Draft), None).is_err());
    }
}
