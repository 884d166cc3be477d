//! Bearer-token authentication.
//!
//! [`authenticate_token`] runs in front of every admin route and stores the
//! caller's user id as a [`CurrentUser`] request extension.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Id of the authenticated user (the `User/<id>` part after the slash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// Maps an access token to a user id.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<String>;
}

/// Fixed `token → user id` table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new<I, T, U>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(t, u)| (t.into(), u.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Parse `token=userId` pairs.
pub fn parse_token_pairs<I, S>(pairs: I) -> Result<Vec<(String, String)>, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|pair| {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                    Ok((token.trim().to_string(), user.trim().to_string()))
                }
                _ => Err(format!("invalid token pair '{pair}', expected token=userId")),
            }
        })
        .collect()
}

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Middleware: reject the request with 401 unless it carries a known token.
pub async fn authenticate_token(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&req) else {
        warn!("missing bearer token for {}", req.uri().path());
        return Err(ApiError::Unauthorized);
    };

    let Some(user) = authenticator.authenticate(&token).await else {
        warn!("unknown bearer token for {}", req.uri().path());
        return Err(ApiError::Unauthorized);
    };

    debug!(%user, "authenticated");
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_pairs() {
        let pairs = parse_token_pairs(["abc=u1", " def = u2 "]).unwrap();
        assert_eq!(
            pairs,
            vec![("abc".to_string(), "u1".to_string()), ("def".to_string(), "u2".to_string())]
        );
    }

    #[test]
    fn rejects_malformed_token_pairs() {
        assert!(parse_token_pairs(["abc"]).is_err());
        assert!(parse_token_pairs(["=u1"]).is_err());
        assert!(parse_token_pairs(["abc="]).is_err());
    }

    #[tokio::test]
    async fn static_authenticator_looks_up_tokens() {
        let auth = StaticTokenAuthenticator::new([("abc", "u1")]);
        assert_eq!(auth.authenticate("abc").await.as_deref(), Some("u1"));
        assert_eq!(auth.authenticate("nope").await, None);
    }
}
