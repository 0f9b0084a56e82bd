use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a partner (reseller) operating a storefront.
///
/// A partner attaches its own selling price to a subset of the central
/// catalog and accrues a balance from delivered orders.
///
/// # Examples
///
/// ```
/// use storefront_ledger::core::partner::PartnerId;
///
/// let north = PartnerId::new("kitchen-north");
/// let south = PartnerId::new("kitchen-south");
/// assert_ne!(north, south);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(String);

impl PartnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a product in the admin-owned catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
