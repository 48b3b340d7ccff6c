//! Who is acting, and how their actions are signed into history.

use crate::accounts::AccountRegistry;
use crate::constants::{SYSTEM_COMMIT_EMAIL, SYSTEM_COMMIT_NAME};
use crate::{ResourceError, ResourceResult};
use std::fmt;

/// The party performing an operation.
///
/// `System` is used by trusted callers (the CLI run by an operator, internal bag creation).
/// `User` carries the username of an authenticated client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requester {
    System,
    User(String),
}

impl Requester {
    pub fn user(username: impl Into<String>) -> Self {
        Self::User(username.into())
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::User(name) => Some(name),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User(name) => f.write_str(name),
        }
    }
}

/// Identity written into commit signatures and `Author-*` trailers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    pub fn system() -> Self {
        Self {
            name: SYSTEM_COMMIT_NAME.to_string(),
            email: SYSTEM_COMMIT_EMAIL.to_string(),
        }
    }

    /// Resolves the commit identity of a requester.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Unauthenticated`] if a user requester is not a registered
    /// account.
    pub fn for_requester(requester: &Requester, accounts: &AccountRegistry) -> ResourceResult<Self> {
        match requester {
            Requester::System => Ok(Self::system()),
            Requester::User(name) => {
                let user = accounts
                    .user_from_id(name)
                    .map_err(|_| ResourceError::Unauthenticated)?;
                if user.username.as_str() != name {
                    return Err(ResourceError::Unauthenticated);
                }
                Ok(Self {
                    name: user.display_name().to_string(),
                    email: user.email.as_str().to_string(),
                })
            }
        }
    }
}
