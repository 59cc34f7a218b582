use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("A session lifetime of {ttl_hours} hours from {now} is out of range")]
    ExpiryOutOfRange { ttl_hours: u32, now: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// A login as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    /// Still usable, but expires within the refresh window.
    ExpiringSoon,
    Expired,
}

/// Lifetimes applied to new sessions and to status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub ttl_hours: u32,
    pub refresh_window_minutes: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        // matches the backend's auth cookie lifetime
        Self {
            ttl_hours: 24,
            refresh_window_minutes: 60,
        }
    }
}

impl SessionPolicy {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::hours(i64::from(self.ttl_hours))
    }

    #[must_use]
    pub fn refresh_window(&self) -> Duration {
        Duration::minutes(i64::from(self.refresh_window_minutes))
    }

    pub fn start(
        &self,
        token: String,
        user: User,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let expires_at = now
            .checked_add_signed(self.ttl())
            .ok_or(SessionError::ExpiryOutOfRange {
                ttl_hours: self.ttl_hours,
                now,
            })?;
        Ok(Session {
            token,
            user,
            issued_at: now,
            expires_at,
        })
    }

    #[must_use]
    pub fn status(&self, session: &Session, now: DateTime<Utc>) -> SessionStatus {
        session.status(now, self.refresh_window())
    }
}

impl Session {
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>, refresh_window: Duration) -> SessionStatus {
        if now >= self.expires_at {
            SessionStatus::Expired
        } else if self.expires_at - now <= refresh_window {
            SessionStatus::ExpiringSoon
        } else {
            SessionStatus::Valid
        }
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Who requests are made as. Passed explicitly to anything that talks to
/// the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl AuthState {
    /// Drop an expired session. There is no refresh endpoint, so expiry
    /// means logging in again.
    #[must_use]
    pub fn effective(self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Authenticated(ref s) if now >= s.expires_at => Self::Anonymous,
            other => other,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Authenticated(s) => Some(&s.token),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(s) => Some(&s.user),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(s) => Some(s),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<Session>> for AuthState {
    fn from(session: Option<Session>) -> Self {
        session.map_or(Self::Anonymous, Self::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn user() -> User {
        User {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    fn session() -> Session {
        SessionPolicy::default()
            .start("tok".to_string(), user(), t0())
            .unwrap()
    }

    #[test]
    fn test_default_policy_is_one_day() {
        let s = session();
        assert_eq!(s.expires_at - s.issued_at, Duration::hours(24));
    }

    #[test]
    fn test_status_transitions() {
        let policy = SessionPolicy::default();
        let s = session();
        assert_eq!(policy.status(&s, t0()), SessionStatus::Valid);
        assert_eq!(
            policy.status(&s, t0() + Duration::hours(22)),
            SessionStatus::Valid
        );
        assert_eq!(
            policy.status(&s, t0() + Duration::hours(23)),
            SessionStatus::ExpiringSoon
        );
        assert_eq!(
            policy.status(&s, t0() + Duration::hours(24)),
            SessionStatus::Expired
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = SessionPolicy {
            ttl_hours: 2,
            refresh_window_minutes: 10,
        };
        let s = policy.start("tok".to_string(), user(), t0()).unwrap();
        assert_eq!(s.expires_at, t0() + Duration::hours(2));
        assert_eq!(
            policy.status(&s, t0() + Duration::minutes(100)),
            SessionStatus::Valid
        );
        assert_eq!(
            policy.status(&s, t0() + Duration::minutes(115)),
            SessionStatus::ExpiringSoon
        );
    }

    #[test]
    fn test_huge_ttl_is_an_error() {
        let policy = SessionPolicy {
            ttl_hours: u32::MAX,
            refresh_window_minutes: 60,
        };
        let err = policy.start("tok".to_string(), user(), t0()).unwrap_err();
        assert_eq!(
            err,
            SessionError::ExpiryOutOfRange {
                ttl_hours: u32::MAX,
                now: t0()
            }
        );

        let near_end = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        let day = SessionPolicy::default();
        assert!(day.start("tok".to_string(), user(), near_end).is_err());
    }

    #[test]
    fn test_effective_drops_expired_session() {
        let state = AuthState::Authenticated(session());
        let later = t0() + Duration::hours(25);
        assert_eq!(state.clone().effective(later), AuthState::Anonymous);
        assert!(state.effective(t0()).is_authenticated());
    }

    #[test]
    fn test_anonymous_has_no_token() {
        let state = AuthState::default();
        assert!(state.token().is_none());
        assert!(state.user().is_none());
        assert_eq!(AuthState::from(None), AuthState::Anonymous);
    }

    #[test]
    fn test_authenticated_accessors() {
        let state = AuthState::from(Some(session()));
        assert_eq!(state.token(), Some("tok"));
        assert_eq!(state.user().unwrap().email, "ada@example.com");
    }

    #[test]
    fn test_remaining_never_negative() {
        let s = session();
        assert_eq!(s.remaining(t0()), Duration::hours(24));
        assert_eq!(s.remaining(t0() + Duration::days(3)), Duration::zero());
    }

    #[test]
    fn test_session_json_round_trip() {
        let s = session();
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_policy_partial_config() {
        let policy: SessionPolicy = serde_json::from_str(r#"{"ttl_hours": 8}"#).unwrap();
        assert_eq!(policy.ttl_hours, 8);
        assert_eq!(policy.refresh_window_minutes, 60);
    }
}
