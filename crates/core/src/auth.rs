use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::UserId;

/// Opaque per-request data handed to the user resolver.
///
/// The attachment and expense services never look inside this; they only
/// pass it to the configured [`UserResolver`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Session token presented by the client, if any.
    pub session: Option<String>,
}

impl RequestContext {
    /// A context with no credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context carrying a session token.
    #[must_use]
    pub fn with_session(token: impl Into<String>) -> Self {
        Self {
            session: Some(token.into()),
        }
    }
}

/// Resolves the current user from an opaque request context.
///
/// Authentication itself (session issuance, token verification) is an
/// external concern. Every service operation starts by calling this and
/// aborts with an authentication failure when it returns `None`.
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Return the authenticated user for this request, or `None`.
    async fn resolve_user(&self, ctx: &RequestContext) -> Option<UserId>;
}

/// A fixed session-token → user map.
///
/// Used by tests and local development; production deployments plug in a
/// resolver backed by their session store.
#[derive(Debug, Default)]
pub struct StaticUserResolver {
    sessions: HashMap<String, UserId>,
}

impl StaticUserResolver {
    /// Create an empty resolver (every request resolves to `None`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session token for a user.
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user: impl Into<UserId>) -> Self {
        self.sessions.insert(token.into(), user.into());
        self
    }
}

#[async_trait]
impl UserResolver for StaticUserResolver {
    async fn resolve_user(&self, ctx: &RequestContext) -> Option<UserId> {
        let token = ctx.session.as_deref()?;
        self.sessions.get(token).cloned()
    }
}
