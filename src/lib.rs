// lib.rs - SIP addressing codec with digest authentication

use thiserror::Error;

pub mod digest;
pub mod host;
pub mod params;
pub mod uri;
pub mod user_info;

pub use host::Host;
pub use params::{ParamBag, ParamValue};
pub use uri::{Scheme, SipUri, UriHeaders, UriParams};
pub use user_info::UserInfo;

// Security limit based on RFC recommendations and common attack vectors
pub const MAX_URI_LENGTH: usize = 2048;

/// URI schemes this codec parses. Anything else is rejected rather than
/// guessed at.
pub const SIP_SCHEMES: [&str; 2] = ["sip", "sips"];

/// SIP methods recognized when normalizing a `method` URI parameter.
pub const SIP_METHODS: [&str; 14] = [
    "REGISTER",
    "INVITE",
    "ACK",
    "BYE",
    "CANCEL",
    "OPTIONS",
    "INFO",
    "UPDATE",
    "PRACK",
    "SUBSCRIBE",
    "NOTIFY",
    "REFER",
    "MESSAGE",
    "PUBLISH",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UriError {
    #[error("Unsupported URI scheme in: {0}")]
    UnsupportedScheme(String),

    #[error("URI host is empty")]
    EmptyHost,

    #[error("User info carries neither a user nor a telephone subscriber")]
    MissingIdentity,

    #[error("Malformed port: {0}")]
    MalformedPort(String),

    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),

    #[error("URI too long: {0} bytes (max: {1})")]
    UriTooLong(usize, usize),
}
