use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Bearer token plus its validity window.
///
/// Built only from a successful fetch and replaced wholesale on every renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Lifetimes past the representable range saturate at `DateTime::MAX_UTC`.
    pub fn new(value: String, issued_at: DateTime<Utc>, expires_in_seconds: i64) -> Self {
        let expires_at = Duration::try_seconds(expires_in_seconds.max(0))
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            value,
            issued_at,
            expires_at,
        }
    }

    /// Point at which the scheduler renews this token.
    pub fn renew_at(&self, safety_margin_seconds: u64) -> DateTime<Utc> {
        let margin = Duration::try_seconds(i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        self.expires_at
            .checked_sub_signed(margin)
            .unwrap_or(self.issued_at)
            .max(self.issued_at)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }

    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_window_follows_expires_in() {
        let issued_at = Utc::now();
        let credential = Credential::new("abc".to_owned(), issued_at, 7200);

        assert_eq!(credential.expires_at - credential.issued_at, Duration::seconds(7200));
        assert!(credential.is_valid(issued_at));
        assert!(credential.is_valid(issued_at + Duration::seconds(7199)));
        assert!(!credential.is_valid(issued_at + Duration::seconds(7200)));
        assert_eq!(credential.renew_at(120), issued_at + Duration::seconds(7080));
        assert_eq!(credential.expires_in_seconds(issued_at + Duration::seconds(200)), 7000);
        assert_eq!(credential.expires_in_seconds(issued_at + Duration::seconds(9000)), 0);
    }

    #[test]
    fn oversized_lifetime_saturates() {
        let issued_at = Utc::now();
        let credential = Credential::new("abc".to_owned(), issued_at, 10_000_000_000_000);

        assert_eq!(credential.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(credential.is_valid(issued_at));
        assert!(credential.renew_at(120) > issued_at);
        assert!(credential.expires_in_seconds(issued_at) > 0);

        let credential = Credential::new("abc".to_owned(), issued_at, i64::MAX);
        assert_eq!(credential.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn renewal_never_precedes_issue() {
        let issued_at = Utc::now();
        let credential = Credential::new("abc".to_owned(), issued_at, 60);
        assert_eq!(credential.renew_at(120), issued_at);
    }

    #[test]
    fn empty_value_is_never_valid() {
        let credential = Credential::new(String::new(), Utc::now(), 7200);
        assert!(!credential.is_valid(credential.issued_at));
    }
}
