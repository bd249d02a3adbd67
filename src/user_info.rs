// user_info.rs - User-info component: user or telephone-subscriber, plus password

use crate::UriError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    // Phone-shaped identities: digit groups joined by '-' (optional '+'),
    // '+' followed by digits, or a bare 11-digit subscriber run.
    static ref DASHED_SUBSCRIBER: Regex = Regex::new(r"^\+?[0-9]+(?:-[0-9]+)+$").unwrap();
    static ref GLOBAL_SUBSCRIBER: Regex = Regex::new(r"^\+[0-9]+$").unwrap();
    static ref BARE_SUBSCRIBER: Regex = Regex::new(r"^[0-9]{11}$").unwrap();
}

/// The identity inside the user-info: a user name or a telephone
/// subscriber, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    User(String),
    TelephoneSubscriber(String),
}

impl Identity {
    fn as_str(&self) -> &str {
        match self {
            Identity::User(s) | Identity::TelephoneSubscriber(s) => s.as_str(),
        }
    }
}

/// User-info portion of a SIP URI (`user[:password]@`).
///
/// The user/telephone-subscriber split is a heuristic classification, not a
/// strict grammar match: an identity carrying a password is always a user,
/// and otherwise phone-shaped text (see the patterns above) is a
/// telephone-subscriber. Percent-escapes are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    identity: Identity,
    password: Option<String>,
}

impl UserInfo {
    pub fn user(name: &str) -> Self {
        Self {
            identity: Identity::User(name.to_string()),
            password: None,
        }
    }

    pub fn telephone_subscriber(number: &str) -> Self {
        Self {
            identity: Identity::TelephoneSubscriber(number.to_string()),
            password: None,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Split off a trailing `:password` segment, then classify what is left.
    pub fn parse(raw: &str) -> Self {
        let (identity_raw, password) = match raw.rsplit_once(':') {
            Some((left, pass)) if !pass.contains('@') => (left, Some(pass.to_string())),
            _ => (raw, None),
        };

        let identity = if password.is_some() {
            // Subscriber numbers do not authenticate with passwords
            Identity::User(identity_raw.to_string())
        } else if is_phone_shaped(identity_raw) {
            Identity::TelephoneSubscriber(identity_raw.to_string())
        } else {
            Identity::User(identity_raw.to_string())
        };

        Self { identity, password }
    }

    pub fn user_name(&self) -> Option<&str> {
        match &self.identity {
            Identity::User(name) => Some(name.as_str()),
            Identity::TelephoneSubscriber(_) => None,
        }
    }

    pub fn subscriber_number(&self) -> Option<&str> {
        match &self.identity {
            Identity::TelephoneSubscriber(number) => Some(number.as_str()),
            Identity::User(_) => None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    /// A URI must identify somebody; an empty identity is rejected here
    /// rather than at parse time.
    pub fn validate(&self) -> Result<(), UriError> {
        if self.identity.as_str().is_empty() {
            return Err(UriError::MissingIdentity);
        }
        Ok(())
    }
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity.as_str())?;
        if let Some(password) = &self.password {
            write!(f, ":{}", password)?;
        }
        Ok(())
    }
}

fn is_phone_shaped(identity: &str) -> bool {
    DASHED_SUBSCRIBER.is_match(identity)
        || GLOBAL_SUBSCRIBER.is_match(identity)
        || BARE_SUBSCRIBER.is_match(identity)
}
