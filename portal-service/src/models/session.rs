use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side session payload. The browser only ever holds the session id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Set once the user is authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Account created by signup and waiting for its activation code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_activation_user_id: Option<String>,
    /// When the last activation code was issued for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_resend_last: Option<DateTime<Utc>>,
}

impl SessionData {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn clear_pending(&mut self) {
        self.pending_activation_user_id = None;
        self.otp_resend_last = None;
    }

    /// Seconds left before another code may be issued, if any.
    pub fn resend_wait(&self, now: DateTime<Utc>, cooldown_seconds: i64) -> Option<i64> {
        let last = self.otp_resend_last?;
        let elapsed = (now - last).num_seconds();
        (elapsed < cooldown_seconds).then(|| (cooldown_seconds - elapsed).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn resend_wait_counts_down_the_cooldown() {
        let now = Utc::now();
        let mut s = SessionData::default();
        assert_eq!(s.resend_wait(now, 60), None);

        s.otp_resend_last = Some(now - Duration::seconds(20));
        assert_eq!(s.resend_wait(now, 60), Some(40));

        s.otp_resend_last = Some(now - Duration::seconds(60));
        assert_eq!(s.resend_wait(now, 60), None);
    }
}
