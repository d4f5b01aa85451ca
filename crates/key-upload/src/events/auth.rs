//! Bearer-token to region lookup used to attribute audit events.
//!
//! The table uses `arc-swap` so lookups never block and the whole table can
//! be replaced atomically.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use thiserror::Error;

/// Region the token table assigns to tokens nobody mapped to a real region.
pub const UNMAPPED_REGION: &str = "302";

/// Resolves an originator token to the region it was issued to.
pub trait Authenticator: Send + Sync {
    /// Return the token's region, or `None` for unknown tokens.
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Errors from parsing a token table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenTableError {
    /// An entry is not of the form `token=region` with both halves non-empty.
    #[error("malformed token entry at position {0}: expected token=region")]
    MalformedEntry(usize),
}

/// Shared, lock-free token table.
#[derive(Clone, Debug)]
pub struct TokenTable {
    inner: Arc<ArcSwap<HashMap<String, String>>>,
}

impl TokenTable {
    /// Create a new, empty [`TokenTable`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
        }
    }

    /// Build a table from a comma-separated `token=region` list.
    ///
    /// Whitespace around entries is ignored; an empty string yields an empty
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`TokenTableError::MalformedEntry`] for the first bad entry.
    pub fn parse(list: &str) -> Result<Self, TokenTableError> {
        let mut tokens = HashMap::new();
        for (i, entry) in list.split(',').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((token, region)) if !token.trim().is_empty() && !region.trim().is_empty() => {
                    tokens.insert(token.trim().to_owned(), region.trim().to_owned());
                }
                _ => return Err(TokenTableError::MalformedEntry(i)),
            }
        }
        let table = Self::new();
        table.replace_all(tokens);
        Ok(table)
    }

    /// Return the number of tokens currently known.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Return `true` if no tokens are known.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Atomically replace the entire token map.
    pub fn replace_all(&self, tokens: HashMap<String, String>) {
        self.inner.store(Arc::new(tokens));
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for TokenTable {
    fn authenticate(&self, token: &str) -> Option<String> {
        self.inner.load().get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initially_empty() {
        let table = TokenTable::new();
        assert!(table.is_empty());
        assert_eq!(table.authenticate("anything"), None);
    }

    #[test]
    fn parse_pairs() {
        let table = TokenTable::parse("abc=ON, def=QC ,ghi=302").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.authenticate("abc").as_deref(), Some("ON"));
        assert_eq!(table.authenticate("def").as_deref(), Some("QC"));
        assert_eq!(table.authenticate("ghi").as_deref(), Some(UNMAPPED_REGION));
        assert_eq!(table.authenticate("zzz"), None);
    }

    #[test]
    fn parse_empty_list() {
        assert!(TokenTable::parse("").unwrap().is_empty());
        assert!(TokenTable::parse(" , ").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_malformed_entries() {
        assert_eq!(
            TokenTable::parse("abc=ON,nope").unwrap_err(),
            TokenTableError::MalformedEntry(1)
        );
        assert!(TokenTable::parse("=ON").is_err());
        assert!(TokenTable::parse("abc=").is_err());
    }

    #[test]
    fn replace_all_is_atomic() {
        let table = TokenTable::parse("a=ON").unwrap();
        let mut next = HashMap::new();
        next.insert("b".into(), "BC".into());
        table.replace_all(next);

        assert_eq!(table.authenticate("a"), None);
        assert_eq!(table.authenticate("b").as_deref(), Some("BC"));
    }

    #[test]
    fn clones_share_table() {
        let table = TokenTable::new();
        let clone = table.clone();
        table.replace_all(HashMap::from([("t".to_owned(), "NS".to_owned())]));
        assert_eq!(clone.authenticate("t").as_deref(), Some("NS"));
    }
}
