use std::fmt::{Debug, Formatter};

/// Bearer credential attached to every request. Obtained and refreshed
/// elsewhere.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct BearerToken(String);

impl BearerToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for BearerToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&"[redacted]").finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::auth::BearerToken;

    #[test]
    fn debug_output_is_redacted() {
        let token = BearerToken::new("very-secret");
        assert!(!format!("{token:?}").contains("very-secret"));
        assert_eq!(token.expose(), "very-secret");
    }
}
