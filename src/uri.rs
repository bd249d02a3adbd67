// uri.rs - SIP/SIPS URI grammar: scheme, parameters, headers and the full URI

use crate::host::Host;
use crate::params::{ParamBag, ParamValue};
use crate::user_info::UserInfo;
use crate::{UriError, MAX_URI_LENGTH, SIP_METHODS, SIP_SCHEMES};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, value},
    sequence::terminated,
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => write!(f, "sip"),
            Scheme::Sips => write!(f, "sips"),
        }
    }
}

impl FromStr for Scheme {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if !SIP_SCHEMES.contains(&lower.as_str()) {
            return Err(UriError::UnsupportedScheme(s.to_string()));
        }
        match lower.as_str() {
            "sips" => Ok(Scheme::Sips),
            _ => Ok(Scheme::Sip),
        }
    }
}

fn parse_scheme(input: &str) -> IResult<&str, Scheme> {
    terminated(
        alt((
            value(Scheme::Sips, tag_no_case("sips")),
            value(Scheme::Sip, tag_no_case("sip")),
        )),
        char(':'),
    )(input)
}

fn parse_port(input: &str) -> Result<u16, UriError> {
    let mut parser = all_consuming(map_res(
        digit1::<&str, nom::error::Error<&str>>,
        str::parse::<u16>,
    ));
    match parser(input) {
        Ok((_, port)) => Ok(port),
        Err(_) => Err(UriError::MalformedPort(input.to_string())),
    }
}

/// Split `host[:port]`, keeping the last `:` out of any IPv6 bracket. A
/// bare multi-colon remainder is an unbracketed IPv6 literal, not a port.
fn split_host_port(input: &str) -> Result<(&str, Option<u16>), UriError> {
    if input.starts_with('[') {
        if let Some(end) = input.find(']') {
            let rest = &input[end + 1..];
            if let Some(port_str) = rest.strip_prefix(':') {
                return Ok((&input[..end + 1], Some(parse_port(port_str)?)));
            }
            return Ok((input, None));
        }
        return Ok((input, None));
    }

    match input.rfind(':') {
        Some(_) if input.matches(':').count() > 1 => Ok((input, None)),
        Some(idx) => Ok((&input[..idx], Some(parse_port(&input[idx + 1..])?))),
        None => Ok((input, None)),
    }
}

fn take_text(bag: &mut ParamBag, name: &str) -> Option<String> {
    let key = bag
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))?
        .to_string();
    match bag.get(&key) {
        Some(ParamValue::Text(_)) => match bag.remove(&key) {
            Some(ParamValue::Text(text)) => Some(text),
            _ => None,
        },
        // A recognized name in flag form stays in the bag untouched
        _ => None,
    }
}

fn take_flag(bag: &mut ParamBag, name: &str) -> bool {
    let key = bag
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .map(str::to_string);
    match key {
        Some(key) => bag.remove(&key).is_some(),
        None => false,
    }
}

/// URI parameters (`;key=value` segments). The six recognized parameters
/// are lifted out of the bag into typed storage at parse time; everything
/// else stays in `other`. Recognized values are stored as written so a
/// replayed URI is byte-faithful to its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriParams {
    transport: Option<String>,
    user: Option<String>,
    method: Option<String>,
    ttl: Option<u8>,
    maddr: Option<String>,
    lr: bool,
    other: ParamBag,
}

impl UriParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let mut bag = ParamBag::parse(raw, ';')?;
        let mut params = Self::new();

        params.transport = take_text(&mut bag, "transport");
        params.user = take_text(&mut bag, "user");
        params.method = take_text(&mut bag, "method");
        if let Some(raw_ttl) = take_text(&mut bag, "ttl") {
            match raw_ttl.parse::<u8>() {
                Ok(ttl) => params.ttl = Some(ttl),
                // Lenient by design: a bad ttl drops, the URI survives
                Err(_) => warn!(ttl = %raw_ttl, "dropping invalid ttl URI parameter"),
            }
        }
        params.maddr = take_text(&mut bag, "maddr");
        params.lr = take_flag(&mut bag, "lr");
        params.other = bag;

        Ok(params)
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn ttl(&self) -> Option<u8> {
        self.ttl
    }

    pub fn maddr(&self) -> Option<&str> {
        self.maddr.as_deref()
    }

    pub fn lr(&self) -> bool {
        self.lr
    }

    pub fn set_transport(&mut self, transport: &str) {
        self.transport = Some(transport.to_string());
        self.other.touch("transport");
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = Some(user.to_string());
        self.other.touch("user");
    }

    /// Store a method parameter, uppercased per SIP convention.
    pub fn set_method(&mut self, method: &str) {
        let upper = method.to_ascii_uppercase();
        if !SIP_METHODS.contains(&upper.as_str()) {
            warn!(method = %upper, "method URI parameter is not a known SIP method");
        }
        self.method = Some(upper);
        self.other.touch("method");
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = Some(ttl);
        self.other.touch("ttl");
    }

    pub fn set_maddr(&mut self, maddr: &str) {
        self.maddr = Some(maddr.to_string());
        self.other.touch("maddr");
    }

    pub fn set_lr(&mut self, lr: bool) {
        self.lr = lr;
        if lr {
            self.other.touch("lr");
        }
    }

    /// Extension parameter access.
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.other.get(key)
    }

    pub fn set_param(&mut self, key: &str, value: Option<String>) {
        self.other.set(key, value);
    }

    pub fn remove_param(&mut self, key: &str) -> Option<ParamValue> {
        self.other.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.transport.is_none()
            && self.user.is_none()
            && self.method.is_none()
            && self.ttl.is_none()
            && self.maddr.is_none()
            && !self.lr
            && self.other.is_empty()
    }

    /// Render with a leading `;`, or an empty string when there is nothing
    /// to emit. Single-use after a parse (see [`ParamBag::format`]).
    pub fn format(&mut self) -> String {
        let mut bag = std::mem::take(&mut self.other);
        let body = bag.format(';', |key| self.render_recognized(key));
        self.other = bag;

        if body.is_empty() {
            String::new()
        } else {
            format!(";{}", body)
        }
    }

    fn render_recognized(&self, key: &str) -> Option<String> {
        if key.eq_ignore_ascii_case("transport") {
            self.transport.as_ref().map(|v| format!("{}={}", key, v))
        } else if key.eq_ignore_ascii_case("user") {
            self.user.as_ref().map(|v| format!("{}={}", key, v))
        } else if key.eq_ignore_ascii_case("method") {
            self.method.as_ref().map(|v| format!("{}={}", key, v))
        } else if key.eq_ignore_ascii_case("ttl") {
            self.ttl.map(|v| format!("{}={}", key, v))
        } else if key.eq_ignore_ascii_case("maddr") {
            self.maddr.as_ref().map(|v| format!("{}={}", key, v))
        } else if key.eq_ignore_ascii_case("lr") {
            self.lr.then(|| key.to_string())
        } else {
            None
        }
    }
}

/// URI headers (`?key=value&key2=value2`). No header name is recognized by
/// the grammar, so this is a pure pass-through bag over `&`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriHeaders(ParamBag);

impl UriHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, UriError> {
        Ok(Self(ParamBag::parse(raw, '&')?))
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Option<String>) {
        self.0.set(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Render without a leading separator; the URI prepends `?`.
    pub fn format(&mut self) -> String {
        self.0.format('&', |_| None)
    }
}

/// A SIP or SIPS URI (RFC 3261 §19.1).
///
/// `parse` is deliberately permissive (heuristic boundaries, no percent
/// -escape handling); call [`SipUri::validate`] before using a URI where
/// strict conformance matters, e.g. as an outbound Request-URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipUri {
    pub scheme: Scheme,
    pub user_info: Option<UserInfo>,
    pub host: Host,
    pub port: Option<u16>,
    pub params: UriParams,
    pub headers: UriHeaders,
}

impl SipUri {
    pub fn new(scheme: Scheme, host: Host) -> Self {
        Self {
            scheme,
            user_info: None,
            host,
            port: None,
            params: UriParams::new(),
            headers: UriHeaders::new(),
        }
    }

    /// Parse a raw SIP/SIPS URI. Headers are stripped from the end first,
    /// then parameters, then the user-info/host-port split on the last `@`.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let raw = raw.trim();

        let (rest, scheme) = parse_scheme(raw)
            .map_err(|_| UriError::UnsupportedScheme(raw.to_string()))?;

        let (rest, headers) = match rest.rfind('?') {
            Some(idx) => (&rest[..idx], UriHeaders::parse(&rest[idx + 1..])?),
            None => (rest, UriHeaders::new()),
        };

        let (rest, params) = match rest.find(';') {
            Some(idx) => (&rest[..idx], UriParams::parse(&rest[idx + 1..])?),
            None => (rest, UriParams::new()),
        };

        let (user_info, host_port) = match rest.rfind('@') {
            Some(idx) => (Some(UserInfo::parse(&rest[..idx])), &rest[idx + 1..]),
            None => (None, rest),
        };

        let (host_raw, port) = split_host_port(host_port)?;
        let host = Host::parse(host_raw)?;

        Ok(Self {
            scheme,
            user_info,
            host,
            port,
            params,
            headers,
        })
    }

    /// Render the URI. Parameter and header order replays the original
    /// input; this consumes the replay state, so format once per parse.
    pub fn format(&mut self) -> String {
        let mut out = format!("{}:", self.scheme);

        if let Some(user_info) = &self.user_info {
            out.push_str(&user_info.to_string());
            out.push('@');
        }

        out.push_str(&self.host.to_string());

        if let Some(port) = self.port {
            out.push(':');
            out.push_str(&port.to_string());
        }

        out.push_str(&self.params.format());

        let headers = self.headers.format();
        if !headers.is_empty() {
            out.push('?');
            out.push_str(&headers);
        }

        out
    }

    /// Strict-mode check, separate from the permissive `parse`.
    pub fn validate(&self) -> Result<(), UriError> {
        self.host.validate()?;

        if let Some(user_info) = &self.user_info {
            user_info.validate()?;
        }

        let rendered = self.clone().format();
        if rendered.len() > MAX_URI_LENGTH {
            return Err(UriError::UriTooLong(rendered.len(), MAX_URI_LENGTH));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FULL_URI: &str = "sip:34020000001320000001:Ali12345@192.168.0.1:5060\
                            ;transport=udp;user=kokutas;method=register;ttl=5\
                            ;maddr=192.168.0.26;lr?token=xyz&expires=3600";

    #[test]
    fn test_full_uri_round_trip() {
        let mut uri = SipUri::parse(FULL_URI).unwrap();
        assert_eq!(uri.format(), FULL_URI);
    }

    #[test]
    fn test_full_uri_components() {
        let uri = SipUri::parse(FULL_URI).unwrap();

        assert_eq!(uri.scheme, Scheme::Sip);
        let user_info = uri.user_info.as_ref().unwrap();
        assert_eq!(user_info.user_name(), Some("34020000001320000001"));
        assert_eq!(user_info.password(), Some("Ali12345"));
        assert_eq!(uri.host.to_string(), "192.168.0.1");
        assert_eq!(uri.port, Some(5060));

        assert_eq!(uri.params.transport(), Some("udp"));
        assert_eq!(uri.params.user(), Some("kokutas"));
        assert_eq!(uri.params.method(), Some("register"));
        assert_eq!(uri.params.ttl(), Some(5));
        assert_eq!(uri.params.maddr(), Some("192.168.0.26"));
        assert!(uri.params.lr());

        assert_eq!(
            uri.headers.get("token"),
            Some(&ParamValue::Text("xyz".to_string()))
        );
        assert_eq!(
            uri.headers.get("expires"),
            Some(&ParamValue::Text("3600".to_string()))
        );
    }

    fn parse_and_format(raw: &str) -> String {
        let mut uri = SipUri::parse(raw).unwrap();
        uri.format()
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = parse_and_format(FULL_URI);
        let twice = parse_and_format(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scheme_case_insensitive_and_normalized() {
        let mut uri = SipUri::parse("SIP:alice@example.com").unwrap();
        assert_eq!(uri.scheme, Scheme::Sip);
        assert_eq!(uri.format(), "sip:alice@example.com");

        let uri = SipUri::parse("sips:alice@example.com").unwrap();
        assert_eq!(uri.scheme, Scheme::Sips);
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(matches!(
            SipUri::parse("http://example.com"),
            Err(UriError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            SipUri::parse("alice@example.com"),
            Err(UriError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Scheme::from_str("tel"),
            Err(UriError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_uri_without_user_info() {
        let mut uri = SipUri::parse("sip:proxy.example.com;lr").unwrap();
        assert!(uri.user_info.is_none());
        assert!(uri.params.lr());
        assert_eq!(uri.format(), "sip:proxy.example.com;lr");
    }

    #[test]
    fn test_malformed_port() {
        assert!(matches!(
            SipUri::parse("sip:example.com:abc"),
            Err(UriError::MalformedPort(_))
        ));
        assert!(matches!(
            SipUri::parse("sip:example.com:70000"),
            Err(UriError::MalformedPort(_))
        ));
        assert!(matches!(
            SipUri::parse("sip:example.com:"),
            Err(UriError::MalformedPort(_))
        ));
    }

    #[test]
    fn test_ipv6_host_with_port() {
        let mut uri = SipUri::parse("sip:[fe80::1]:5061").unwrap();
        assert!(uri.host.as_ipv6().is_some());
        assert_eq!(uri.port, Some(5061));
        assert_eq!(uri.format(), "sip:[fe80::1]:5061");
    }

    #[test]
    fn test_bare_ipv6_host_is_not_a_port_split() {
        let uri = SipUri::parse("sip:2001:db8::1").unwrap();
        assert!(uri.host.as_ipv6().is_some());
        assert_eq!(uri.port, None);
    }

    #[test]
    fn test_empty_host_rejected() {
        assert_eq!(SipUri::parse("sip:alice@"), Err(UriError::EmptyHost));
        assert_eq!(SipUri::parse("sip:"), Err(UriError::EmptyHost));
    }

    #[test]
    fn test_invalid_ttl_dropped_not_fatal() {
        let mut uri = SipUri::parse("sip:example.com;ttl=300;transport=udp").unwrap();
        assert_eq!(uri.params.ttl(), None);
        assert_eq!(uri.params.transport(), Some("udp"));
        // the dropped parameter does not come back on format
        assert_eq!(uri.format(), "sip:example.com;transport=udp");
    }

    #[test]
    fn test_recognized_params_case_insensitive() {
        let mut uri = SipUri::parse("sip:example.com;Transport=TCP;LR").unwrap();
        assert_eq!(uri.params.transport(), Some("TCP"));
        assert!(uri.params.lr());
        // replay keeps the original spelling
        assert_eq!(uri.format(), "sip:example.com;Transport=TCP;LR");
    }

    #[test]
    fn test_empty_param_list_is_not_an_error() {
        let mut uri = SipUri::parse("sip:example.com;;").unwrap();
        assert!(uri.params.is_empty());
        assert_eq!(uri.format(), "sip:example.com");
    }

    #[test]
    fn test_extension_params_survive() {
        let mut uri = SipUri::parse("sip:example.com;x-custom=1;flag").unwrap();
        assert_eq!(
            uri.params.param("x-custom"),
            Some(&ParamValue::Text("1".to_string()))
        );
        assert_eq!(uri.params.param("flag"), Some(&ParamValue::Flag));
        assert_eq!(uri.format(), "sip:example.com;x-custom=1;flag");
    }

    #[test]
    fn test_programmatic_construction() {
        let mut uri = SipUri::new(Scheme::Sip, Host::hostname("example.com"));
        uri.user_info = Some(UserInfo::user("alice"));
        uri.port = Some(5060);
        uri.params.set_transport("tcp");
        uri.params.set_method("register");
        uri.params.set_lr(true);
        uri.headers.set("expires", Some("3600".to_string()));

        assert_eq!(
            uri.format(),
            "sip:alice@example.com:5060;transport=tcp;method=REGISTER;lr?expires=3600"
        );
    }

    #[test]
    fn test_rewriting_a_parsed_param() {
        let mut uri = SipUri::parse("sip:example.com;transport=udp;x=1").unwrap();
        uri.params.set_transport("tls");
        assert_eq!(uri.format(), "sip:example.com;transport=tls;x=1");
    }

    #[test]
    fn test_validate_rejects_bad_construction() {
        let uri = SipUri::new(Scheme::Sip, Host::Hostname(String::new()));
        assert_eq!(uri.validate(), Err(UriError::EmptyHost));

        let mut uri = SipUri::new(Scheme::Sip, Host::hostname("example.com"));
        uri.user_info = Some(UserInfo::user(""));
        assert_eq!(uri.validate(), Err(UriError::MissingIdentity));

        let uri = SipUri::parse(FULL_URI).unwrap();
        assert!(uri.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_uri() {
        let mut uri = SipUri::new(Scheme::Sip, Host::hostname("example.com"));
        uri.user_info = Some(UserInfo::user(&"a".repeat(MAX_URI_LENGTH)));
        assert!(matches!(uri.validate(), Err(UriError::UriTooLong(_, _))));
    }

    proptest! {
        #[test]
        fn prop_parse_format_fixpoint(
            user in "[a-z][a-z0-9]{0,8}",
            host in "[a-z]{1,10}\\.(com|net|cn)",
            port in proptest::option::of(1u16..=65535),
            transport in proptest::option::of("udp|tcp|tls"),
            flag in proptest::bool::ANY,
        ) {
            let mut raw = format!("sip:{}@{}", user, host);
            if let Some(port) = port {
                raw.push_str(&format!(":{}", port));
            }
            if let Some(transport) = &transport {
                raw.push_str(&format!(";transport={}", transport));
            }
            if flag {
                raw.push_str(";lr");
            }

            let once = parse_and_format(&raw);
            prop_assert_eq!(&once, &raw);

            let twice = parse_and_format(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
