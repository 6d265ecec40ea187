use quiz_core::model::UserId;

/// The signed-in student, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: UserId,
    pub display_name: String,
}

/// Source of the current user. Read once, when an attempt finishes.
pub trait Identity: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Identity fixed at startup (CLI flags or environment).
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user: CurrentUser,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(uid: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user: CurrentUser {
                uid,
                display_name: display_name.into(),
            },
        }
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        Some(self.user.clone())
    }
}

/// Nobody is signed in; results stay local.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Identity for Anonymous {
    fn current_user(&self) -> Option<CurrentUser> {
        None
    }
}
