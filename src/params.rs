// params.rs - Ordered parameter bag with round-trip replay

use crate::UriError;
use serde::{Deserialize, Serialize};

/// Value of a single parameter. A flag parameter (`;lr`) is distinct from a
/// parameter whose value is the empty string (`;tag=`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    Flag,
    Text(String),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Flag => None,
            ParamValue::Text(s) => Some(s.as_str()),
        }
    }
}

/// Insertion-ordered key/value store used by URI parameters, URI headers and
/// header extension parameters.
///
/// The order of parameters in the original input is captured at parse time
/// and replayed once by [`ParamBag::format`], so a parsed bag reformats
/// byte-for-byte. `format` consumes the replay state: a bag is formatted
/// once per parse, and must not be mutated from another call site while a
/// `format` is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBag {
    entries: Vec<(String, ParamValue)>,
    order: Vec<String>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a separator-delimited parameter list. Empty fragments (doubled
    /// separators) are skipped. A fragment without `=` becomes a flag.
    pub fn parse(raw: &str, separator: char) -> Result<Self, UriError> {
        let mut bag = Self::new();

        for fragment in raw.split(separator) {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }

            let (key, value) = match fragment.split_once('=') {
                Some((key, value)) => {
                    let value = unquote(value.trim(), fragment)?;
                    (key.trim(), ParamValue::Text(value))
                }
                None => (fragment, ParamValue::Flag),
            };

            if !bag.order.iter().any(|k| k == key) {
                bag.order.push(key.to_string());
            }
            bag.set_value(key, value);
        }

        Ok(bag)
    }

    /// Insert or update a parameter. Updating an existing key keeps its
    /// recorded position; a new key is emitted after the replayed entries.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        let value = match value {
            Some(text) => ParamValue::Text(text),
            None => ParamValue::Flag,
        };
        self.set_value(key, value);
    }

    fn set_value(&mut self, key: &str, value: ParamValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Record `key` in the replay order without storing a value. Used by
    /// owning types whose recognized fields live outside the bag.
    pub fn touch(&mut self, key: &str) {
        if !self.order.iter().any(|k| k == key) {
            self.order.push(key.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Replay the recorded parameter order, then append entries added after
    /// the parse. Each recorded slot is offered to `render_recognized`
    /// first; if the closure declines, the key is looked up in (and removed
    /// from) the bag. Recorded keys with neither a rendering nor a bag entry
    /// are consumed silently.
    ///
    /// Destructive: the replay order and all entries are gone afterwards.
    pub fn format(
        &mut self,
        separator: char,
        mut render_recognized: impl FnMut(&str) -> Option<String>,
    ) -> String {
        let order = std::mem::take(&mut self.order);
        let mut parts = Vec::with_capacity(order.len() + self.entries.len());

        for key in &order {
            if let Some(rendered) = render_recognized(key) {
                // drop any shadowed bag entry so it cannot render twice
                self.remove(key);
                parts.push(rendered);
            } else if let Some(value) = self.remove(key) {
                parts.push(render_entry(key, &value));
            }
        }

        for (key, value) in self.entries.drain(..) {
            parts.push(render_entry(&key, &value));
        }

        parts.join(&separator.to_string())
    }
}

fn render_entry(key: &str, value: &ParamValue) -> String {
    match value {
        ParamValue::Flag => key.to_string(),
        // Values containing '/' travel quoted on the wire
        ParamValue::Text(text) if text.contains('/') => format!("{}=\"{}\"", key, text),
        ParamValue::Text(text) => format!("{}={}", key, text),
    }
}

fn unquote(value: &str, fragment: &str) -> Result<String, UriError> {
    if let Some(rest) = value.strip_prefix('"') {
        match rest.strip_suffix('"') {
            Some(inner) => Ok(inner.to_string()),
            None => Err(UriError::MalformedParameter(fragment.to_string())),
        }
    } else {
        Ok(value.to_string())
    }
}
