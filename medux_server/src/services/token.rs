//! Signed session tokens: `<user_id>.<expires_unix>.<hex hmac-sha256>`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed session token")]
    Malformed,
    #[error("session token signature mismatch")]
    BadSignature,
    #[error("session token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn signer(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take a key of any size")
}

/// Issue a token for `user_id` valid for `ttl` from `now`.
pub fn issue(secret: &str, user_id: i64, ttl: Duration, now: DateTime<Utc>) -> SessionToken {
    let expires_at = now + ttl;
    let payload = format!("{user_id}.{}", expires_at.timestamp());
    let mut mac = signer(secret);
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    SessionToken {
        token: format!("{payload}.{signature}"),
        expires_at,
    }
}

/// Verify a token and return the user id it was issued for.
pub fn verify(secret: &str, token: &str, now: DateTime<Utc>) -> Result<i64, TokenError> {
    let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

    let mut mac = signer(secret);
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let (user_id, expires) = payload.split_once('.').ok_or(TokenError::Malformed)?;
    let user_id: i64 = user_id.parse().map_err(|_| TokenError::Malformed)?;
    let expires: i64 = expires.parse().map_err(|_| TokenError::Malformed)?;
    if expires <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SECRET: &str = "test-secret";

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn issues_hmac_signed_tokens() {
        let issued = issue(SECRET, 42, Duration::seconds(1000), at(1_699_999_000));
        assert_eq!(
            issued.token,
            "42.1700000000.51a68e1b3a5141db02ea9b24bd8f0d6d992135caec1c863eb112b46231499c5c"
        );
        assert_eq!(issued.expires_at, at(1_700_000_000));
    }

    #[test]
    fn verifies_until_expiry() {
        let issued = issue(SECRET, 42, Duration::seconds(1000), at(1_699_999_000));
        assert_eq!(verify(SECRET, &issued.token, at(1_699_999_999)), Ok(42));
        assert_eq!(
            verify(SECRET, &issued.token, at(1_700_000_000)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn rejects_tampering() {
        let issued = issue(SECRET, 42, Duration::seconds(1000), at(1_699_999_000));
        let forged = issued.token.replacen("42.", "1.", 1);
        assert_eq!(verify(SECRET, &forged, at(1_699_999_000)), Err(TokenError::BadSignature));
        assert_eq!(
            verify("other-secret", &issued.token, at(1_699_999_000)),
            Err(TokenError::BadSignature)
        );
        assert_eq!(verify(SECRET, "garbage", at(0)), Err(TokenError::Malformed));
        assert_eq!(verify(SECRET, "1.2.zz", at(0)), Err(TokenError::Malformed));
    }
}
