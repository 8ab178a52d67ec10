//! The acting-user seam.
//!
//! Status changes and creations are attributed to the current user when one
//! is signed in. Anonymous guest sessions yield `None` and the attribution
//! columns stay untouched.

#![allow(clippy::module_name_repetitions)]

/// Supplies the current authenticated user, if any.
pub trait Identity: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// A fixed identity for tests and non-interactive drivers.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    /// An identity signed in as `id`.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
        }
    }

    /// An anonymous guest session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
