//! Limit classes: which quota applies to a check.

use std::fmt;
use std::str::FromStr;

use crate::error::ThrottleError;

/// The identity class a check is made for.
///
/// Each class has its own configured quota and its own key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitClass {
    /// Limit by client IP address
    Ip,
    /// Limit by API token
    Token,
}

impl LimitClass {
    /// Namespace prefix used in identity keys of this class.
    pub fn prefix(&self) -> &'static str {
        match self {
            LimitClass::Ip => "ip",
            LimitClass::Token => "token",
        }
    }
}

impl fmt::Display for LimitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for LimitClass {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" | "ipLimit" => Ok(LimitClass::Ip),
            "token" | "tokenLimit" => Ok(LimitClass::Token),
            other => Err(ThrottleError::UnknownLimitClass(other.to_string())),
        }
    }
}
