//! Storage scope identifiers.

use std::fmt;

/// Prefix for conversation key scopes.
pub const CONVERSATION_PREFIX: &str = "chat_key_";

/// Prefix for local user key scopes.
pub const USER_PREFIX: &str = "user_key_";

/// Storage key for one entry, e.g. `chat_key_r1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    /// Scope holding a conversation's key.
    pub fn conversation(conversation_id: &str) -> Self {
        Self(format!("{CONVERSATION_PREFIX}{conversation_id}"))
    }

    /// Scope holding a local user's key.
    pub fn user(user_id: &str) -> Self {
        Self(format!("{USER_PREFIX}{user_id}"))
    }

    /// Wrap a raw scope string (as read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conversation id if this is a conversation scope.
    pub fn conversation_id(&self) -> Option<&str> {
        self.0.strip_prefix(CONVERSATION_PREFIX)
    }

    /// User id if this is a user scope.
    pub fn user_id(&self) -> Option<&str> {
        self.0.strip_prefix(USER_PREFIX)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_scope_roundtrip() {
        let scope = ScopeId::conversation("r1");
        assert_eq!(scope.as_str(), "chat_key_r1");
        assert_eq!(scope.conversation_id(), Some("r1"));
        assert_eq!(scope.user_id(), None);
    }

    #[test]
    fn user_scope_roundtrip() {
        let scope = ScopeId::user("u1");
        assert_eq!(scope.as_str(), "user_key_u1");
        assert_eq!(scope.user_id(), Some("u1"));
        assert_eq!(scope.conversation_id(), None);
    }
}
