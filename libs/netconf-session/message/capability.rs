//! Capability identifiers and capability sets advertised in hello messages

use std::collections::BTreeSet;
use std::fmt;

/// Base protocol version 1.0 (end-of-message framing only)
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Base protocol version 1.1 (adds chunked framing)
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// XML namespace of the base protocol elements
pub const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Immutable set of capability URIs advertised by one side of a session
///
/// Identifiers are trimmed on construction; empty identifiers are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: BTreeSet<String>,
}

impl CapabilitySet {
    /// Create a capability set from any iterator of identifiers
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: capabilities
                .into_iter()
                .map(|c| c.into().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// The default client/server advertisement: base 1.0 and base 1.1
    pub fn base() -> Self {
        Self::new([BASE_1_0, BASE_1_1])
    }

    /// Check whether an identifier is advertised
    pub fn contains(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Check whether chunked framing (base 1.1) is advertised
    #[inline]
    pub fn supports_chunked_framing(&self) -> bool {
        self.contains(BASE_1_1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, capability) in self.capabilities.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", capability)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_are_trimmed_and_deduplicated() {
        let set = CapabilitySet::new(["  urn:a ", "urn:a", "", "urn:b"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("urn:a"));
        assert!(set.contains("urn:b"));
    }

    #[test]
    fn test_base_set_supports_chunked_framing() {
        assert!(CapabilitySet::base().supports_chunked_framing());
        assert!(!CapabilitySet::new([BASE_1_0]).supports_chunked_framing());
    }

    #[test]
    fn test_display() {
        let set = CapabilitySet::new(["urn:b", "urn:a"]);
        assert_eq!(set.to_string(), "{urn:a, urn:b}");
    }
}
