//! Bearer token extraction and cache-key derivation.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use hub_error::{GatewayError, GatewayResult};
use sha2::{Digest, Sha256};

const CACHE_KEY_PREFIX: &str = "token_valid:";

/// Pull the token out of `Authorization: Bearer <token>`.
/// The scheme is matched case-insensitively.
pub fn extract_bearer_token(headers: &HeaderMap) -> GatewayResult<&str> {
    let header = headers.get(AUTHORIZATION).ok_or(GatewayError::TokenMissing)?;

    let value = header
        .to_str()
        .map_err(|_| GatewayError::TokenMalformed("header is not valid ASCII".to_string()))?
        .trim();

    if value.is_empty() {
        return Err(GatewayError::TokenMissing);
    }

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| GatewayError::TokenMalformed("expected '<scheme> <token>'".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GatewayError::TokenMalformed(format!("unsupported scheme '{}'", scheme)));
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(GatewayError::TokenMalformed("token is empty or contains whitespace".to_string()));
    }

    Ok(token)
}

/// `token_valid:<hex sha256>`; the raw token never leaves this function
pub fn token_cache_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", CACHE_KEY_PREFIX, hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(extract_bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(extract_bearer_token(&headers("BEARER   abc ")).unwrap(), "abc");
    }

    #[test]
    fn test_missing_header() {
        let err = extract_bearer_token(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, GatewayError::TokenMissing));
    }

    #[test]
    fn test_malformed_header() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer a b", "abc"] {
            let err = extract_bearer_token(&headers(value)).unwrap_err();
            assert!(matches!(err, GatewayError::TokenMalformed(_)), "{value}");
        }
    }

    #[test]
    fn test_cache_key_is_hashed() {
        let key = token_cache_key("secret-token");

        assert!(key.starts_with("token_valid:"));
        assert!(!key.contains("secret-token"));
        assert_eq!(key.len(), "token_valid:".len() + 64);
        assert_eq!(key, token_cache_key("secret-token"));
        assert_ne!(key, token_cache_key("other-token"));
    }
}
