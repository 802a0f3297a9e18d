//! Package registry access.
//!
//! The planner only sees [`PackageSource`]; [`NuGetClient`] is the HTTP
//! implementation speaking the v3 registration and flat-container protocols.

mod client;
mod nuspec;

use std::fmt;

use serde::Serialize;

pub use client::NuGetClient;
pub(crate) use nuspec::parse_nuspec_support;

pub const NUGET_PUBLIC_URL: &str = "https://api.nuget.org";

/// Frameworks a single package version declares support for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkSupport {
    /// No dependency groups, or a group without a framework: usable anywhere.
    Any,
    Frameworks(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub version: String,
    pub support: FrameworkSupport,
}

impl VersionEntry {
    #[must_use]
    pub fn new(version: impl Into<String>, support: FrameworkSupport) -> Self {
        Self {
            version: version.into(),
            support,
        }
    }
}

/// Everything a registry knows about one package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageIndex {
    pub source_url: String,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("package `{package}` not found at {source_url}")]
    NotFound { package: String, source_url: String },
    #[error("registry returned HTTP {status} for {url}")]
    Http { status: u16, url: String },
    #[error("registry request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unreadable registry response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RegistryError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Where packages are looked up. Implementations must not keep any state the
/// caller relies on; they just answer queries.
pub trait PackageSource {
    /// Queries the public registry.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] when the registry has no such package, or
    /// any transport/decoding failure.
    fn lookup_public(&self, package: &str) -> Result<PackageIndex, RegistryError>;

    /// Probes the configured private sources in order and returns the first
    /// hit.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] when no private source knows the package
    /// (including when none are configured).
    fn lookup_private(&self, package: &str) -> Result<PackageIndex, RegistryError>;

    fn has_private_sources(&self) -> bool;
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One registry root. Basic-auth credentials are only ever attached to
/// private sources.
#[derive(Debug, Clone)]
pub struct RegistrySource {
    base_url: String,
    credentials: Option<Credentials>,
}

impl RegistrySource {
    #[must_use]
    pub fn public(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    #[must_use]
    pub fn private(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub(crate) fn registration_url(&self, id: &str) -> String {
        format!("{}/v3/registration5-semver1/{id}/index.json", self.base_url)
    }

    pub(crate) fn flat_index_url(&self, id: &str) -> String {
        format!("{}/v3-flatcontainer/{id}/index.json", self.base_url)
    }

    pub(crate) fn nuspec_url(&self, id: &str, version: &str) -> String {
        format!(
            "{}/v3-flatcontainer/{id}/{}/{id}.nuspec",
            self.base_url,
            version.to_ascii_lowercase()
        )
    }
}
