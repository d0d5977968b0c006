//! Identity key generation and handling.

use std::fmt;
use std::net::IpAddr;

use super::class::LimitClass;

const BLOCK_SUFFIX: &str = "block";

/// A key that uniquely identifies a rate-limited subject.
///
/// Keys are namespaced by class (`ip:<address>`, `token:<api-key>`), so an IP
/// and a token with the same text never share a counter. The window counter
/// lives under the key itself and the block flag under `<key>:block`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Create a key for a client IP address.
    ///
    /// IPv4-mapped IPv6 addresses collapse to their IPv4 form, so a client
    /// seen over a dual-stack socket keeps one counter.
    pub fn ip(addr: IpAddr) -> Self {
        Self::namespaced(LimitClass::Ip, &addr.to_canonical().to_string())
    }

    /// Create a key for an API token.
    pub fn token(api_key: &str) -> Self {
        Self::namespaced(LimitClass::Token, api_key)
    }

    fn namespaced(class: LimitClass, subject: &str) -> Self {
        Self(format!("{}:{}", class.prefix(), subject))
    }

    /// The key under which the block flag for this identity is stored.
    pub fn block_key(&self) -> String {
        format!("{}:{}", self.0, BLOCK_SUFFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for IdentityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
