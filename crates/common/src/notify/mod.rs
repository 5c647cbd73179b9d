//! Comment/reaction notification fan-out
//!
//! Planning is a pure function over the ids involved; dispatch writes
//! each draft independently and never fails the surrounding request.
//! A failed write is logged and counted; notifications are a
//! best-effort side channel, not part of the comment's durability.

use crate::db::models::{NotificationData, NotificationKind};
use crate::db::Repository;
use crate::metrics;
use tracing::warn;
use uuid::Uuid;

/// A notification waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient: Uuid,
    pub kind: NotificationKind,
    pub data: NotificationData,
}

/// Everything the planner needs to know about a freshly created comment
#[derive(Debug, Clone)]
pub struct CommentFanout {
    pub comment_id: Uuid,
    pub manga_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub author_id: Uuid,
    pub manga_owner_id: Uuid,
    /// Author of the parent comment, for replies
    pub parent_author_id: Option<Uuid>,
}

/// Decide who hears about a new comment.
///
/// - The parent comment's author gets a reply notification, unless they
///   wrote the reply themselves.
/// - The manga owner gets a comment notification, unless they wrote the
///   comment or already receive the reply notification.
pub fn plan_comment_notifications(event: &CommentFanout) -> Vec<NotificationDraft> {
    let data = NotificationData {
        manga_id: Some(event.manga_id),
        chapter_id: event.chapter_id,
        comment_id: Some(event.comment_id),
        from_user: Some(event.author_id),
    };

    let mut drafts = Vec::new();

    if let Some(parent_author) = event.parent_author_id {
        if parent_author != event.author_id {
            drafts.push(NotificationDraft {
                recipient: parent_author,
                kind: NotificationKind::CommentReply,
                data: data.clone(),
            });
        }
    }

    let owner_already_notified = drafts.iter().any(|d| d.recipient == event.manga_owner_id);
    if event.manga_owner_id != event.author_id && !owner_already_notified {
        let kind = if event.chapter_id.is_some() {
            NotificationKind::NewComment
        } else {
            NotificationKind::MangaComment
        };
        drafts.push(NotificationDraft {
            recipient: event.manga_owner_id,
            kind,
            data,
        });
    }

    drafts
}

/// Decide whether a reaction change notifies the comment's author.
/// `liked` is true when a like lands, false when one is withdrawn.
pub fn plan_reaction_notification(
    comment_id: Uuid,
    manga_id: Uuid,
    comment_author: Uuid,
    reactor: Uuid,
    liked: bool,
) -> Option<NotificationDraft> {
    if comment_author == reactor {
        return None;
    }

    Some(NotificationDraft {
        recipient: comment_author,
        kind: if liked {
            NotificationKind::Like
        } else {
            NotificationKind::Unlike
        },
        data: NotificationData {
            manga_id: Some(manga_id),
            chapter_id: None,
            comment_id: Some(comment_id),
            from_user: Some(reactor),
        },
    })
}

/// Write the drafts. Failures are swallowed by design.
pub async fn dispatch(repo: &Repository, drafts: Vec<NotificationDraft>) {
    for draft in drafts {
        let kind = String::from(draft.kind);
        match repo
            .create_notification(draft.recipient, draft.kind, draft.data)
            .await
        {
            Ok(_) => metrics::record_notification(&kind, true),
            Err(e) => {
                metrics::record_notification(&kind, false);
                warn!(
                    error = %e,
                    recipient = %draft.recipient,
                    kind = %kind,
                    "Notification write failed; continuing"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        author: Uuid,
        owner: Uuid,
        parent_author: Option<Uuid>,
        chapter: Option<Uuid>,
    ) -> CommentFanout {
        CommentFanout {
            comment_id: Uuid::new_v4(),
            manga_id: Uuid::new_v4(),
            chapter_id: chapter,
            author_id: author,
            manga_owner_id: owner,
            parent_author_id: parent_author,
        }
    }

    #[test]
    fn test_owner_notified_on_top_level_comment() {
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let drafts = plan_comment_notifications(&event(author, owner, None, None));

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient, owner);
        assert_eq!(drafts[0].kind, NotificationKind::MangaComment);
        assert_eq!(drafts[0].data.from_user, Some(author));
    }

    #[test]
    fn test_chapter_comment_uses_new_comment_kind() {
        let drafts = plan_comment_notifications(&event(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            Some(Uuid::new_v4()),
        ));
        assert_eq!(drafts[0].kind, NotificationKind::NewComment);
    }

    #[test]
    fn test_self_comment_produces_nothing() {
        let user = Uuid::new_v4();
        assert!(plan_comment_notifications(&event(user, user, None, None)).is_empty());
    }

    #[test]
    fn test_reply_notifies_parent_author_and_owner() {
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let parent_author = Uuid::new_v4();
        let drafts =
            plan_comment_notifications(&event(author, owner, Some(parent_author), None));

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].recipient, parent_author);
        assert_eq!(drafts[0].kind, NotificationKind::CommentReply);
        assert_eq!(drafts[1].recipient, owner);
    }

    #[test]
    fn test_reply_to_own_comment_skips_reply_notification() {
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let drafts = plan_comment_notifications(&event(author, owner, Some(author), None));

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient, owner);
    }

    #[test]
    fn test_owner_not_notified_twice_when_also_parent_author() {
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let drafts = plan_comment_notifications(&event(author, owner, Some(owner), None));

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, NotificationKind::CommentReply);
    }

    #[test]
    fn test_reaction_skips_self() {
        let user = Uuid::new_v4();
        assert!(
            plan_reaction_notification(Uuid::new_v4(), Uuid::new_v4(), user, user, true).is_none()
        );
    }

    #[test]
    fn test_reaction_kinds() {
        let author = Uuid::new_v4();
        let reactor = Uuid::new_v4();
        let like =
            plan_reaction_notification(Uuid::new_v4(), Uuid::new_v4(), author, reactor, true)
                .unwrap();
        assert_eq!(like.kind, NotificationKind::Like);

        let unlike =
            plan_reaction_notification(Uuid::new_v4(), Uuid::new_v4(), author, reactor, false)
                .unwrap();
        assert_eq!(unlike.kind, NotificationKind::Unlike);
    }
}
