//! Identity and role resolution from access tokens.
//!
//! The gateway never validates token signatures; tokens come straight from
//! the identity provider over a trusted channel, so only the payload segment
//! is decoded. Identity claims are tried in a fixed order and the first
//! non-empty one wins. Role extraction runs a fixed sequence of extractor
//! stages and stops at the first stage that yields a usable role; the
//! stages are declared in one place so the precedence is readable at a
//! glance.
//!
//! # Example
//!
//! ```ignore
//! use authgate_auth::identity::IdentityResolver;
//!
//! let resolver = IdentityResolver::new("gateway");
//! let identity = resolver.resolve(&access_token, Some("openid profile admin"))?;
//! println!("{} -> {:?}", identity.user_id, identity.primary_role);
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// Identity claims, in precedence order. The first claim holding a
/// non-empty string wins.
const IDENTITY_CLAIMS: [&str; 4] = ["sub", "jti", "preferred_username", "email"];

/// Provider-machinery role prefixes that never count as a user's role.
/// Matched case-insensitively.
const NOISE_ROLE_PREFIXES: [&str; 3] = ["offline_access", "uma_authorization", "default-roles-"];

/// Standard OpenID Connect scopes that carry no role information.
const STANDARD_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Why identity resolution failed.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The access token is not a decodable JWT. Workflows treat this the
    /// same as bad credentials.
    #[error("access token is not a decodable JWT: {0}")]
    UndecodableToken(String),

    /// The token decoded but none of the identity claims held a value.
    #[error("token carries no usable identity claim")]
    NoIdentityClaim,
}

/// The outcome of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// The resolved user identifier.
    pub user_id: String,
    /// The first usable role, if any stage produced one. Workflows proceed
    /// without a role; `None` is not an error.
    pub primary_role: Option<String>,
}

/// Resolves a user identity and primary role from an access token.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    client_id: String,
}

impl IdentityResolver {
    /// Creates a resolver scoped to the given client. The client id selects
    /// which `resource_access` entry is consulted for client roles.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// Resolves identity and primary role from the token payload and the
    /// granted scope string from the token response.
    pub fn resolve(
        &self,
        access_token: &str,
        granted_scope: Option<&str>,
    ) -> Result<ResolvedIdentity, ResolveError> {
        let claims = decode_claims(access_token)?;

        let user_id = IDENTITY_CLAIMS
            .iter()
            .find_map(|claim| non_empty_string(claims.get(*claim)))
            .ok_or(ResolveError::NoIdentityClaim)?;

        let stages: [(&str, Vec<String>); 4] = [
            ("roles claim", individual_roles(&claims)),
            ("realm_access", realm_roles(&claims)),
            ("resource_access", client_roles(&claims, &self.client_id)),
            ("scope", scope_roles(granted_scope)),
        ];

        let mut primary_role = None;
        for (stage, candidates) in stages {
            if let Some(role) = candidates.into_iter().find(|role| !is_noise_role(role)) {
                tracing::debug!(%user_id, %role, stage, "resolved primary role");
                primary_role = Some(role);
                break;
            }
        }
        if primary_role.is_none() {
            tracing::debug!(%user_id, "no primary role in token");
        }

        Ok(ResolvedIdentity { user_id, primary_role })
    }
}

/// Decodes the payload segment of a JWT without validating the signature.
fn decode_claims(token: &str) -> Result<Map<String, Value>, ResolveError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => {
            return Err(ResolveError::UndecodableToken(
                "expected three dot-separated segments".into(),
            ));
        }
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|err| ResolveError::UndecodableToken(err.to_string()))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(ResolveError::UndecodableToken(
            "payload is not a JSON object".into(),
        )),
        Err(err) => Err(ResolveError::UndecodableToken(err.to_string())),
    }
}

/// Stage one: a direct `roles` claim, either a string or an array of strings.
fn individual_roles(claims: &Map<String, Value>) -> Vec<String> {
    match claims.get("roles") {
        Some(Value::String(role)) if !role.is_empty() => vec![role.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| non_empty_string(Some(value)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Stage two: `realm_access.roles`.
fn realm_roles(claims: &Map<String, Value>) -> Vec<String> {
    roles_of(claims.get("realm_access"))
}

/// Stage three: `resource_access.<client_id>.roles`.
fn client_roles(claims: &Map<String, Value>, client_id: &str) -> Vec<String> {
    let Some(access) = as_json_object(claims.get("resource_access")) else {
        return Vec::new();
    };
    roles_of(access.get(client_id))
}

/// Stage four: space-separated granted scopes minus the standard trio.
fn scope_roles(granted_scope: Option<&str>) -> Vec<String> {
    granted_scope
        .unwrap_or_default()
        .split_whitespace()
        .filter(|scope| !STANDARD_SCOPES.contains(scope))
        .map(str::to_string)
        .collect()
}

/// Extracts the `roles` array from a claim value that may be a JSON object
/// or a stringified one. Malformed content yields no candidates; later
/// stages still run.
fn roles_of(value: Option<&Value>) -> Vec<String> {
    let Some(object) = as_json_object(value) else {
        return Vec::new();
    };
    match object.get("roles") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| non_empty_string(Some(value)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Interprets a claim value as a JSON object, parsing it first if it
/// arrived as a string. Returns `None` for anything else.
fn as_json_object(value: Option<&Value>) -> Option<Map<String, Value>> {
    match value {
        Some(Value::Object(object)) => Some(object.clone()),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        },
        _ => None,
    }
}

fn is_noise_role(role: &str) -> bool {
    let lowered = role.to_ascii_lowercase();
    NOISE_ROLE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with(claims: Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        format!("{header}.{payload}.sig")
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new("gateway")
    }

    #[test]
    fn test_identity_claim_precedence() {
        let token = token_with(json!({
            "sub": "abc-123",
            "preferred_username": "alice",
            "email": "alice@example.com"
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.user_id, "abc-123");

        let token = token_with(json!({
            "sub": "",
            "jti": "token-7",
            "email": "alice@example.com"
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.user_id, "token-7");

        let token = token_with(json!({
            "sub": "",
            "jti": "",
            "preferred_username": "alice",
            "email": "alice@example.com"
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.user_id, "alice");

        let token = token_with(json!({ "email": "alice@example.com" }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.user_id, "alice@example.com");
    }

    #[test]
    fn test_no_identity_claim() {
        let token = token_with(json!({ "aud": "gateway" }));
        let err = resolver().resolve(&token, None).unwrap_err();
        assert!(matches!(err, ResolveError::NoIdentityClaim));
    }

    #[test]
    fn test_undecodable_tokens() {
        for token in ["", "only-one-segment", "two.segments", "a.!!!not-base64!!!.c"] {
            let err = resolver().resolve(token, None).unwrap_err();
            assert!(matches!(err, ResolveError::UndecodableToken(_)), "{token:?}");
        }
    }

    #[test]
    fn test_direct_roles_claim_wins() {
        let token = token_with(json!({
            "sub": "u1",
            "roles": ["MANAGER"],
            "realm_access": { "roles": ["ADMIN"] }
        }));
        let identity = resolver().resolve(&token, Some("openid profile USER")).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("MANAGER"));
    }

    #[test]
    fn test_realm_roles_skip_noise() {
        let token = token_with(json!({
            "sub": "u1",
            "realm_access": {
                "roles": ["offline_access", "uma_authorization", "default-roles-myrealm", "ADMIN"]
            }
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn test_noise_filter_is_case_insensitive() {
        let token = token_with(json!({
            "sub": "u1",
            "realm_access": { "roles": ["OFFLINE_ACCESS", "Default-Roles-App"] },
            "resource_access": { "gateway": { "roles": ["EDITOR"] } }
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("EDITOR"));
    }

    #[test]
    fn test_client_roles_match_own_client_only() {
        let token = token_with(json!({
            "sub": "u1",
            "resource_access": {
                "other-client": { "roles": ["ADMIN"] },
                "gateway": { "roles": ["VIEWER"] }
            }
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("VIEWER"));
    }

    #[test]
    fn test_stringified_access_claims_parse() {
        let token = token_with(json!({
            "sub": "u1",
            "realm_access": r#"{"roles":["ADMIN"]}"#
        }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn test_malformed_stage_falls_through() {
        let token = token_with(json!({
            "sub": "u1",
            "realm_access": "{not json",
            "resource_access": 42
        }));
        let identity = resolver().resolve(&token, Some("openid profile email AUDITOR")).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("AUDITOR"));
    }

    #[test]
    fn test_scope_fallback_discards_standard_scopes() {
        let token = token_with(json!({ "sub": "u1" }));
        let identity = resolver().resolve(&token, Some("openid email profile")).unwrap();
        assert_eq!(identity.primary_role, None);

        let identity = resolver().resolve(&token, Some("openid offline_access STAFF")).unwrap();
        assert_eq!(identity.primary_role.as_deref(), Some("STAFF"));
    }

    #[test]
    fn test_no_role_is_not_an_error() {
        let token = token_with(json!({ "sub": "u1" }));
        let identity = resolver().resolve(&token, None).unwrap();
        assert_eq!(identity.primary_role, None);
    }
}
