//! Bidirectional pairing table
//!
//! Both directions of an edge are written and cleared together, so
//! `partner_of(a) == Some(b)` holds exactly when `partner_of(b) == Some(a)`.

use std::collections::HashMap;

/// Symmetric partner relation between peer names
#[derive(Debug, Default)]
pub struct PairingTable {
    partners: HashMap<String, String>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `a` with `b`, dropping any pairing either had before
    pub fn link(&mut self, a: &str, b: &str) {
        self.unlink(a);
        self.unlink(b);
        self.partners.insert(a.to_string(), b.to_string());
        self.partners.insert(b.to_string(), a.to_string());
    }

    /// Remove the edge touching `name`, returning the former partner
    pub fn unlink(&mut self, name: &str) -> Option<String> {
        let partner = self.partners.remove(name)?;
        if partner != name {
            self.partners.remove(&partner);
        }
        Some(partner)
    }

    pub fn partner_of(&self, name: &str) -> Option<&str> {
        self.partners.get(name).map(String::as_str)
    }

    /// Number of names with a partner
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}
