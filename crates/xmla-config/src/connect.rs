//! Connect-string parsing and `Cache.` namespace routing.
//!
//! A connect string is a `;`-separated list of `Key=Value` pairs, optionally
//! prefixed with `jdbc:xmla:`:
//!
//! ```text
//! jdbc:xmla:Server=http://olap.local/xmla;Catalog=FoodMart;Cache=memory;Cache.Size=100
//! ```
//!
//! Values may be double-quoted to carry `;` or surrounding whitespace; a
//! doubled quote (`""`) inside a quoted value stands for one quote character.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

use tracing::warn;

use crate::{ConfigError, Result};

/// Prefix accepted (and ignored) at the start of a connect string.
pub const CONNECT_PREFIX: &str = "jdbc:xmla:";

/// Namespace for properties routed to the cache store.
pub const CACHE_PREFIX: &str = "Cache.";

/// Flat, ordered string-to-string property map.
pub type PropertyMap = BTreeMap<String, String>;

/// Connection properties split at the cache boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitProperties {
    /// Everything that is not in the `Cache.` namespace.
    pub connection: PropertyMap,
    /// `Cache.`-prefixed properties with the prefix stripped.
    pub cache: PropertyMap,
}

/// Parse a connect string into a property map.
///
/// Later occurrences of a key override earlier ones. Empty segments
/// (`;;`) are skipped.
pub fn parse_connect_string(input: &str) -> Result<PropertyMap> {
    let (offset, body) = match strip_prefix_ignore_case(input, CONNECT_PREFIX) {
        Some(rest) => (CONNECT_PREFIX.len(), rest),
        None => (0, input),
    };

    let mut properties = PropertyMap::new();
    let mut chars = body.char_indices().peekable();

    loop {
        skip_while(&mut chars, |c| c == ';' || c.is_whitespace());
        let Some(&(key_start, _)) = chars.peek() else {
            break;
        };

        let key = read_key(&mut chars, offset + key_start)?;
        skip_while(&mut chars, char::is_whitespace);

        let value = match chars.peek().copied() {
            Some((quote_pos, '"')) => {
                chars.next();
                read_quoted(&mut chars, offset, offset + quote_pos)?
            }
            _ => read_plain(&mut chars),
        };

        properties.insert(key, value);
    }

    Ok(properties)
}

/// Render a property map back into a connect string (without prefix).
pub fn to_connect_string(properties: &PropertyMap) -> String {
    properties
        .iter()
        .map(|(key, value)| {
            if needs_quoting(value) {
                format!("{}=\"{}\"", key, value.replace('"', "\"\""))
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Route properties: `Cache.<key>` goes to the cache map with the prefix
/// stripped, everything else (including the bare `Cache` selector) stays
/// with the connection.
pub fn split_cache_properties(properties: &PropertyMap) -> SplitProperties {
    let mut split = SplitProperties::default();

    for (key, value) in properties {
        match key.strip_prefix(CACHE_PREFIX) {
            Some("") => {
                warn!(key = %key, "Ignoring cache property with an empty name");
            }
            Some(cache_key) => {
                split.cache.insert(cache_key.to_string(), value.clone());
            }
            None => {
                split.connection.insert(key.clone(), value.clone());
            }
        }
    }

    split
}

fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&input[prefix.len()..])
    } else {
        None
    }
}

fn skip_while(chars: &mut Peekable<CharIndices<'_>>, pred: impl Fn(char) -> bool) {
    while let Some(&(_, c)) = chars.peek() {
        if !pred(c) {
            break;
        }
        chars.next();
    }
}

fn read_key(chars: &mut Peekable<CharIndices<'_>>, key_start: usize) -> Result<String> {
    let mut key = String::new();
    loop {
        match chars.next() {
            Some((_, '=')) => break,
            Some((_, ';')) | None => {
                return Err(ConfigError::InvalidConnectString {
                    position: key_start,
                    reason: format!("expected '=' after key '{}'", key.trim()),
                });
            }
            Some((_, c)) => key.push(c),
        }
    }

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidConnectString {
            position: key_start,
            reason: "empty key".to_string(),
        });
    }
    Ok(key.to_string())
}

fn read_quoted(
    chars: &mut Peekable<CharIndices<'_>>,
    offset: usize,
    quote_pos: usize,
) -> Result<String> {
    let mut value = String::new();
    let mut closed = false;

    while let Some((_, c)) = chars.next() {
        if c != '"' {
            value.push(c);
        } else if matches!(chars.peek(), Some(&(_, '"'))) {
            chars.next();
            value.push('"');
        } else {
            closed = true;
            break;
        }
    }

    if !closed {
        return Err(ConfigError::InvalidConnectString {
            position: quote_pos,
            reason: "unterminated quoted value".to_string(),
        });
    }

    while let Some(&(pos, c)) = chars.peek() {
        if c == ';' {
            break;
        }
        if !c.is_whitespace() {
            return Err(ConfigError::InvalidConnectString {
                position: offset + pos,
                reason: format!("unexpected '{}' after quoted value", c),
            });
        }
        chars.next();
    }

    Ok(value)
}

fn read_plain(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut value = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c == ';' {
            break;
        }
        value.push(c);
        chars.next();
    }
    value.trim().to_string()
}

fn needs_quoting(value: &str) -> bool {
    value.contains(';')
        || value.contains('"')
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
}
