// digest.rs - RFC 2617 digest authentication as reused by SIP (RFC 3261 §22)

use bytes::Bytes;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hash algorithm negotiated in the challenge. Only the MD5 family is used
/// by GB28181-era SIP deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
}

impl Default for DigestAlgorithm {
    fn default() -> Self {
        DigestAlgorithm::Md5
    }
}

impl DigestAlgorithm {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Some(DigestAlgorithm::Md5),
            "MD5-SESS" => Some(DigestAlgorithm::Md5Sess),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Md5 => write!(f, "MD5"),
            DigestAlgorithm::Md5Sess => write!(f, "MD5-sess"),
        }
    }
}

/// Quality of protection: request-line only, or request-line plus body
/// integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qop {
    Auth,
    AuthInt,
}

impl Qop {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auth" => Some(Qop::Auth),
            "auth-int" => Some(Qop::AuthInt),
            _ => None,
        }
    }
}

impl fmt::Display for Qop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qop::Auth => write!(f, "auth"),
            Qop::AuthInt => write!(f, "auth-int"),
        }
    }
}

/// Inputs for one digest computation. A context is built fresh per
/// computation and never mutated; the response is derived, not stored.
#[derive(Debug, Clone)]
pub struct DigestContext {
    pub user: String,
    pub realm: String,
    pub password: String,
    pub method: String,
    pub uri: String,
    pub nonce: String,
    pub cnonce: String,
    pub nc: u32,
    pub qop: Option<Qop>,
    pub algorithm: DigestAlgorithm,
    pub entity_body: Option<Bytes>,
}

impl DigestContext {
    pub fn new(
        user: &str,
        realm: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce: &str,
    ) -> Self {
        Self {
            user: user.to_string(),
            realm: realm.to_string(),
            password: password.to_string(),
            method: method.to_string(),
            uri: uri.to_string(),
            nonce: nonce.to_string(),
            cnonce: String::new(),
            nc: 1,
            qop: None,
            algorithm: DigestAlgorithm::Md5,
            entity_body: None,
        }
    }

    pub fn with_qop(mut self, qop: Qop, cnonce: &str, nc: u32) -> Self {
        self.qop = Some(qop);
        self.cnonce = cnonce.to_string();
        self.nc = nc;
        self
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_entity_body(mut self, body: Bytes) -> Self {
        self.entity_body = Some(body);
        self
    }
}

fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// H(A1): `MD5(user:realm:password)`, re-hashed with `nonce:cnonce` for
/// MD5-sess.
pub fn ha1(ctx: &DigestContext) -> String {
    let base = md5_hex(format!("{}:{}:{}", ctx.user, ctx.realm, ctx.password).as_bytes());
    match ctx.algorithm {
        DigestAlgorithm::Md5 => base,
        DigestAlgorithm::Md5Sess => {
            md5_hex(format!("{}:{}:{}", base, ctx.nonce, ctx.cnonce).as_bytes())
        }
    }
}

/// H(A2): `MD5(method:uri)`; auth-int also covers the entity body.
pub fn ha2(ctx: &DigestContext) -> String {
    match ctx.qop {
        Some(Qop::AuthInt) => {
            let body: &[u8] = ctx.entity_body.as_deref().unwrap_or(&[]);
            let body_hash = md5_hex(body);
            md5_hex(format!("{}:{}:{}", ctx.method, ctx.uri, body_hash).as_bytes())
        }
        _ => md5_hex(format!("{}:{}", ctx.method, ctx.uri).as_bytes()),
    }
}

/// The proof sent back to the challenger. Without qop this is the legacy
/// RFC 2069 3-field form; with qop the RFC 2617 6-field form, nc rendered
/// as 8 hex digits.
pub fn response(ctx: &DigestContext) -> String {
    let ha1 = ha1(ctx);
    let ha2 = ha2(ctx);
    match &ctx.qop {
        None => md5_hex(format!("{}:{}:{}", ha1, ctx.nonce, ha2).as_bytes()),
        Some(qop) => md5_hex(
            format!(
                "{}:{}:{:08x}:{}:{}:{}",
                ha1, ctx.nonce, ctx.nc, ctx.cnonce, qop, ha2
            )
            .as_bytes(),
        ),
    }
}

/// Server-side check of a presented response against the expected one.
pub fn verify(ctx: &DigestContext, presented: &str) -> bool {
    presented.eq_ignore_ascii_case(&response(ctx))
}

/// Server nonce: a cache-busting token bound to the client address and a
/// server-private key. Nonce persistence and replay windows are the
/// caller's responsibility.
pub fn gen_nonce(client_ip: &str, private_key: &str) -> String {
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    nonce_at(client_ip, private_key, now_nanos)
}

/// Clock-explicit variant of [`gen_nonce`].
pub fn nonce_at(client_ip: &str, private_key: &str, now_nanos: u128) -> String {
    md5_hex(format!("{}:{}:{}", client_ip, now_nanos, private_key).as_bytes())
}

/// Client nonce for qop computations.
pub fn gen_cnonce() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
