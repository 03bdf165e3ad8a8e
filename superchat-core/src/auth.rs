//! Authentication and identity. `AuthState` is the session-side state
//! machine; the permission helpers below decide whether a given
//! `AuthState`/message-author pair may perform an action. SuperChat's auth
//! surface (anonymous nickname vs. registered user) is small enough to
//! live directly on the enum rather than behind a separate policy object.

use std::time::Instant;

use superchat_common::UserId;
use superchat_db_entities::User;

use crate::consts::{AUTH_FAILURE_BACKOFF_SECS, AUTH_FAILURE_TERMINATE_AT};

/// Session-side authentication state. Transitions are driven by
/// `SET_NICKNAME`, `AUTH_REQUEST`, `REGISTER_USER`, and `LOGOUT`.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    /// No nickname claimed yet; the session cannot post.
    #[default]
    NotSet,
    /// Posting under a nickname with no backing account.
    Anonymous { nickname: String },
    /// A password/key challenge is outstanding for this nickname.
    Authenticating { nickname: String },
    /// Backed by a `users` row; `user_id` is authoritative for authorship
    /// and permission checks from here on.
    Authenticated { user_id: UserId, nickname: String },
}

impl AuthState {
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Self::NotSet => None,
            Self::Anonymous { nickname }
            | Self::Authenticating { nickname }
            | Self::Authenticated { nickname, .. } => Some(nickname),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Authenticated { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The nickname a posted message should be attributed to: a registered
    /// user's nickname is posted verbatim, an anonymous session's nickname
    /// gets the `~` prefix the server (never the client) applies.
    pub fn display_nickname(&self) -> Option<String> {
        match self {
            Self::NotSet | Self::Authenticating { .. } => None,
            Self::Anonymous { nickname } => Some(format!("~{nickname}")),
            Self::Authenticated { nickname, .. } => Some(nickname.clone()),
        }
    }
}

/// Can `actor` edit or delete `message`'s content? The author (matched by
/// `user_id` for registered authors; an anonymous author's messages are
/// never editable by anyone, since there is no identity to reauthenticate
/// as) or a moderator/admin may.
pub fn can_modify_message(actor: &AuthState, author_user_id: Option<UserId>) -> bool {
    match actor {
        AuthState::Authenticated { user_id, .. } => Some(*user_id) == author_user_id,
        _ => false,
    }
}

pub fn is_moderator_override(actor_user: Option<&User::Model>) -> bool {
    actor_user.is_some_and(|u| u.is_admin() || u.is_moderator())
}

/// Only registered, authenticated users may create channels.
pub fn can_create_channel(actor: &AuthState) -> bool {
    actor.is_authenticated()
}

/// Tracks consecutive authentication failures for one session and derives
/// the exponential backoff/termination ladder: no delay for the first two
/// failures, then [`AUTH_FAILURE_BACKOFF_SECS`] for the next four, then the
/// session is terminated outright.
#[derive(Debug, Default)]
pub struct FailedAuthTracker {
    failures: u32,
    last_failure: Option<Instant>,
}

pub enum AuthFailureAction {
    /// Reply with an error and allow another attempt, optionally not before
    /// `delay` has elapsed since the last failure.
    Retry { delay: std::time::Duration },
    /// Exhausted the ladder; close the session.
    Terminate,
}

impl FailedAuthTracker {
    pub fn record_failure(&mut self) -> AuthFailureAction {
        self.failures += 1;
        self.last_failure = Some(Instant::now());
        if self.failures >= AUTH_FAILURE_TERMINATE_AT {
            return AuthFailureAction::Terminate;
        }
        AuthFailureAction::Retry {
            delay: self.required_backoff(),
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.last_failure = None;
    }

    /// The cooldown required before the next attempt, given the failure
    /// count recorded so far: none for the first two, then
    /// [`AUTH_FAILURE_BACKOFF_SECS`] indexed by failures past that.
    pub fn required_backoff(&self) -> std::time::Duration {
        if self.failures <= 2 {
            std::time::Duration::ZERO
        } else {
            let idx = (self.failures - 3) as usize;
            let secs = AUTH_FAILURE_BACKOFF_SECS
                .get(idx)
                .copied()
                .unwrap_or(*AUTH_FAILURE_BACKOFF_SECS.last().unwrap());
            std::time::Duration::from_secs(secs)
        }
    }

    /// Remaining cooldown before another attempt is accepted, if any.
    pub fn cooldown_remaining(&self, required: std::time::Duration) -> Option<std::time::Duration> {
        let last = self.last_failure?;
        let elapsed = last.elapsed();
        if elapsed >= required {
            None
        } else {
            Some(required - elapsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_two_failures_have_no_delay() {
        let mut t = FailedAuthTracker::default();
        for _ in 0..2 {
            match t.record_failure() {
                AuthFailureAction::Retry { delay } => assert_eq!(delay, std::time::Duration::ZERO),
                AuthFailureAction::Terminate => panic!("terminated too early"),
            }
        }
    }

    #[test]
    fn fifth_failure_terminates() {
        let mut t = FailedAuthTracker::default();
        for _ in 0..4 {
            t.record_failure();
        }
        assert!(matches!(t.record_failure(), AuthFailureAction::Terminate));
    }

    #[test]
    fn anonymous_author_cannot_be_impersonated_by_a_registered_user() {
        let actor = AuthState::Authenticated {
            user_id: 7,
            nickname: "carol".into(),
        };
        assert!(!can_modify_message(&actor, None));
    }

    #[test]
    fn display_nickname_prefixes_anonymous_sessions() {
        let state = AuthState::Anonymous {
            nickname: "guest".into(),
        };
        assert_eq!(state.display_nickname().as_deref(), Some("~guest"));
    }
}
