//! Per-token fragment stowing for protocols that merge messages.
//!
//! # Example
//!
//! ```
//! use wirechain::protocol::{Extract, Message, Reassembler};
//!
//! let mut stow = Reassembler::new();
//! let ready = |parts: &[Message], _meta: &serde_json::Map<String, serde_json::Value>| {
//!     Ok((parts.len() == 2).then(|| parts.to_vec()))
//! };
//!
//! assert!(stow.assemble("a", Message::from("x"), None, ready).unwrap().is_incomplete());
//! let done = stow.assemble("a", Message::from("y"), None, ready).unwrap();
//! assert!(matches!(done, Extract::Yield { messages, .. } if messages.len() == 2));
//! assert!(stow.is_empty());
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{Extract, Message};
use crate::error::Result;

#[derive(Debug, Default)]
struct Stow {
    fragments: Vec<Message>,
    meta: Map<String, Value>,
}

/// Fragments waiting for reassembly, keyed by token.
///
/// Tokens are independent: fragments stowed under one never reach the
/// predicate of another.
#[derive(Debug, Default)]
pub struct Reassembler {
    stowed: HashMap<String, Stow>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stow `fragment` under `token` and ask `ready` whether the set is complete.
    ///
    /// `meta` is merged into the token's metadata. When `ready` returns
    /// messages the token is cleared and they are yielded; `None` or an
    /// `Incomplete` error leave everything stowed and report
    /// [`Extract::Incomplete`]. Any other error drops the token.
    pub fn assemble<F>(
        &mut self,
        token: &str,
        fragment: Message,
        meta: Option<Map<String, Value>>,
        ready: F,
    ) -> Result<Extract>
    where
        F: FnOnce(&[Message], &Map<String, Value>) -> Result<Option<Vec<Message>>>,
    {
        let stow = self.stowed.entry(token.to_string()).or_default();
        stow.fragments.push(fragment);
        if let Some(meta) = meta {
            stow.meta.extend(meta);
        }

        match ready(&stow.fragments, &stow.meta) {
            Ok(Some(messages)) => {
                self.stowed.remove(token);
                tracing::trace!("Reassembled token {} into {} messages", token, messages.len());
                Ok(Extract::Yield {
                    consumed: 0,
                    messages,
                })
            }
            Ok(None) => Ok(Extract::Incomplete),
            Err(e) if e.is_incomplete() => Ok(Extract::Incomplete),
            Err(e) => {
                self.stowed.remove(token);
                Err(e)
            }
        }
    }

    /// Number of fragments stowed under `token`.
    pub fn stowed(&self, token: &str) -> usize {
        self.stowed.get(token).map_or(0, |s| s.fragments.len())
    }

    /// Metadata recorded for `token`.
    pub fn meta(&self, token: &str) -> Option<&Map<String, Value>> {
        self.stowed.get(token).map(|s| &s.meta)
    }

    /// Drop the fragments of one token.
    pub fn discard(&mut self, token: &str) -> bool {
        self.stowed.remove(token).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.stowed.is_empty()
    }

    pub fn clear(&mut self) {
        self.stowed.clear();
    }
}
