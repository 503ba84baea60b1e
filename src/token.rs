use std::time::Duration;

use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::footer::Footer;
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{local, Local};

use crate::error::{ApiError, ApiResult};

/// Fixed context string carried in the token footer, tying tokens to this
/// deployment; a token minted under a different context does not verify.
pub const TOKEN_CONTEXT: &str = "shop-admin";

/// Tokens are valid for 24 hours from issuance. No server-side revocation:
/// validity is solely signature + expiry.
const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn key_from_secret(secret: &[u8]) -> ApiResult<SymmetricKey<V4>> {
    SymmetricKey::<V4>::from(secret)
        .map_err(|_| ApiError::Internal("Token secret must be 32 bytes".into()))
}

/// The footer is authenticated alongside the payload, so the context check
/// happens as part of decryption.
fn context_footer() -> ApiResult<Footer> {
    let mut footer = Footer::new();
    footer
        .add_additional("ctx", TOKEN_CONTEXT)
        .map_err(|_| ApiError::Internal("Failed to build token footer".into()))?;
    Ok(footer)
}

/// Issues a v4.local token carrying the admin id as subject, with
/// issued-at/expiry claims set from now.
pub fn issue(secret: &[u8], admin_id: &str) -> ApiResult<String> {
    let key = key_from_secret(secret)?;
    let footer = context_footer()?;

    let mut claims = Claims::new_expires_in(&TOKEN_TTL)
        .map_err(|_| ApiError::Internal("Failed to generate token".into()))?;
    claims
        .subject(admin_id)
        .map_err(|_| ApiError::Internal("Failed to generate token".into()))?;

    local::encrypt(&key, &claims, Some(&footer), None)
        .map_err(|_| ApiError::Internal("Failed to generate token".into()))
}

/// Verifies a token and returns the admin id it asserts. Any failure
/// (garbage input, wrong key, wrong context, expired claims) is reported
/// uniformly as `Unauthorized`.
pub fn verify(secret: &[u8], token: &str) -> ApiResult<String> {
    let key = key_from_secret(secret)?;
    let footer = context_footer()?;
    let invalid = || ApiError::Unauthorized("Invalid or expired token".into());

    let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|_| invalid())?;
    let rules = ClaimsValidationRules::new();
    let trusted =
        local::decrypt(&key, &untrusted, &rules, Some(&footer), None).map_err(|_| invalid())?;

    trusted
        .payload_claims()
        .and_then(|c| c.get_claim("sub"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const OTHER_SECRET: &[u8] = b"fedcba9876543210fedcba9876543210";

    #[test]
    fn round_trip_returns_subject() {
        let token = issue(SECRET, "admin-42").unwrap();
        assert!(!token.is_empty());
        assert_eq!(verify(SECRET, &token).unwrap(), "admin-42");
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = issue(SECRET, "admin-42").unwrap();
        assert!(matches!(
            verify(OTHER_SECRET, &token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue(SECRET, "admin-42").unwrap();
        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(verify(SECRET, &tampered).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify(SECRET, "not-a-token"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_context_is_rejected() {
        let key = SymmetricKey::<V4>::from(SECRET).unwrap();
        let mut claims = Claims::new().unwrap();
        claims.subject("admin-42").unwrap();
        let mut footer = Footer::new();
        footer.add_additional("ctx", "some-other-app").unwrap();
        let token = local::encrypt(&key, &claims, Some(&footer), None).unwrap();
        assert!(verify(SECRET, &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let key = SymmetricKey::<V4>::from(SECRET).unwrap();
        let mut claims = Claims::new().unwrap();
        claims.subject("admin-42").unwrap();
        claims.expiration("2020-01-01T00:00:00+00:00").unwrap();
        let footer = context_footer().unwrap();
        let token = local::encrypt(&key, &claims, Some(&footer), None).unwrap();
        assert!(matches!(
            verify(SECRET, &token),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
