use super::error_handling::MinerStatsError;
use crate::rx::{Feed, Subject};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub id_token: String,
}

/// The signed-in user, shared by every service that reads user data.
#[derive(Clone)]
pub struct AuthSession {
    user: Subject<Option<AuthUser>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            user: Subject::new(None),
        }
    }

    pub fn signed_in(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(uid, id_token);
        session
    }

    pub fn sign_in(&self, uid: impl Into<String>, id_token: impl Into<String>) {
        let user = AuthUser {
            uid: uid.into(),
            id_token: id_token.into(),
        };
        info!(uid = %user.uid, "user signed in");
        self.user.next(Some(user));
    }

    pub fn sign_out(&self) {
        info!("user signed out");
        self.user.next(None);
    }

    pub fn auth_state(&self) -> Feed<Option<AuthUser>> {
        self.user.feed()
    }

    /// Uid of every signed-in user; nothing while signed out.
    pub fn user_id(&self) -> Feed<String> {
        self.user.feed().filter_map(|user| user.map(|user| user.uid))
    }

    pub fn id_token(&self) -> Feed<String> {
        self.user.feed().filter_map(|user| user.map(|user| user.id_token))
    }

    pub fn current_uid(&self) -> Option<String> {
        self.user.value().flatten().map(|user| user.uid)
    }

    /// Uid for a write, or `NotSignedIn`.
    pub fn require_uid(&self, action: &str) -> Result<String, MinerStatsError> {
        self.current_uid()
            .ok_or_else(|| MinerStatsError::not_signed_in(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_user_id_only_emits_when_signed_in() {
        let session = AuthSession::new();
        let mut uid = session.user_id();
        assert!(tokio::time::timeout(Duration::from_millis(20), uid.next()).await.is_err());

        session.sign_in("u1", "token");
        assert_eq!(uid.next().await, Some(Ok("u1".to_string())));
        assert_eq!(session.require_uid("test").unwrap(), "u1");
    }

    #[test]
    fn test_require_uid_when_signed_out() {
        let session = AuthSession::new();
        assert!(matches!(
            session.require_uid("add bookmark"),
            Err(MinerStatsError::NotSignedIn { .. })
        ));
    }
}
