use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique switch identifier, guaranteed non-empty after trimming.
///
/// The name doubles as the state store key, so two switches with the same
/// name would share persisted state. The registry rejects duplicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SwitchName(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("switch name must not be empty")]
pub struct SwitchNameError;

impl SwitchName {
    pub fn new(value: impl Into<String>) -> Result<Self, SwitchNameError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(SwitchNameError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SwitchName {
    type Error = SwitchNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SwitchName {
    type Error = SwitchNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SwitchName> for String {
    fn from(value: SwitchName) -> Self {
        value.0
    }
}

impl AsRef<str> for SwitchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SwitchName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SwitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
