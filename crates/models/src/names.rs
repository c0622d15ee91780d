use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::Error as SerdeError, Deserialize, Serialize};

lazy_static! {
    // Slugs and platform names surface in warehouse identifiers and artifact
    // paths, so they are restricted to lower-case ASCII snake case.
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
}

fn check_slug<E: SerdeError>(s: &str, what: &str) -> Result<(), E> {
    if SLUG_RE.is_match(s) {
        Ok(())
    } else {
        Err(E::custom(format!(
            "{what} {s:?} must be lower-case ASCII snake case"
        )))
    }
}

/// TenantSlug is the stable identity of one tenant of the platform.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantSlug(String);

impl TenantSlug {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for TenantSlug {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TenantSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        check_slug(&s, "tenant slug")?;
        Ok(TenantSlug(s))
    }
}

/// SourcePlatform names a third-party data system, e.g. `facebook_ads`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePlatform(String);

impl SourcePlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for SourcePlatform {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourcePlatform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        check_slug(&s, "source platform")?;
        Ok(SourcePlatform(s))
    }
}

/// ObjectName names one object exposed by a source platform, e.g. `orders`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for ObjectName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        check_slug(&s, "object name")?;
        Ok(ObjectName(s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slugs_reject_non_snake_case() {
        assert!(serde_json::from_str::<TenantSlug>("\"tyrell_corp\"").is_ok());
        assert!(serde_json::from_str::<TenantSlug>("\"Tyrell Corp\"").is_err());
        assert!(serde_json::from_str::<SourcePlatform>("\"facebook_ads\"").is_ok());
        assert!(serde_json::from_str::<SourcePlatform>("\"9lives\"").is_err());
    }
}
