//! Account identity value object.

use crate::core::error::DomainError;
use crate::core::name::{validate_domain, validate_segment};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const ACCOUNT_PREFIX: &str = "sip:.";

/// Identity of a user account on the conferencing backend (Value Object).
///
/// Equality and hashing consider only `(domain, name, issuer)`; the
/// environment id is carried along for the URI form but two identities that
/// differ only by environment refer to the same account.
///
/// The URI form is `sip:.{issuer}.{name}.[{environment}.]@{domain}`.
#[derive(Debug, Clone)]
pub struct AccountId {
    issuer: String,
    name: String,
    domain: String,
    environment_id: Option<String>,
}

impl AccountId {
    pub fn new(
        issuer: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
        environment_id: Option<String>,
    ) -> Result<Self, DomainError> {
        let issuer = issuer.into();
        let name = name.into();
        let domain = domain.into();
        validate_segment("issuer", &issuer)?;
        validate_segment("account name", &name)?;
        validate_domain(&domain)?;
        if let Some(env) = &environment_id {
            validate_segment("environment id", env)?;
        }
        Ok(Self {
            issuer,
            name,
            domain,
            environment_id,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    /// The URI string used on the wire.
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for AccountId {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.name == other.name && self.issuer == other.issuer
    }
}

impl Eq for AccountId {}

impl Hash for AccountId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.name.hash(state);
        self.issuer.hash(state);
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}.", ACCOUNT_PREFIX, self.issuer, self.name)?;
        if let Some(env) = &self.environment_id {
            write!(f, "{}.", env)?;
        }
        write!(f, "@{}", self.domain)
    }
}

impl FromStr for AccountId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(ACCOUNT_PREFIX)
            .ok_or_else(|| DomainError::invalid_uri(s, "missing 'sip:.' prefix"))?;
        let (local, domain) = rest
            .split_once('@')
            .ok_or_else(|| DomainError::invalid_uri(s, "missing '@domain'"))?;
        let local = local
            .strip_suffix('.')
            .ok_or_else(|| DomainError::invalid_uri(s, "local part must end with '.'"))?;

        let parts: Vec<&str> = local.split('.').collect();
        match parts.as_slice() {
            [issuer, name] => Self::new(*issuer, *name, domain, None),
            [issuer, name, env] => Self::new(*issuer, *name, domain, Some(env.to_string())),
            _ => Err(DomainError::invalid_uri(
                s,
                "expected issuer.name[.environment]",
            )),
        }
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
