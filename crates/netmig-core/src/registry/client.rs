use anyhow::Result;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use netmig_domain::{normalize_registry_framework, PackageVersion};

use super::{
    parse_nuspec_support, FrameworkSupport, PackageIndex, PackageSource, RegistryError,
    RegistrySource, VersionEntry,
};
use crate::config::Settings;
use crate::net::build_http_client;

#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    /// Absent when the registry only links the page.
    #[serde(default)]
    items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
struct RegistrationLeaf {
    #[serde(rename = "catalogEntry")]
    catalog_entry: CatalogEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    version: String,
    #[serde(default)]
    listed: Option<bool>,
    #[serde(default)]
    dependency_groups: Vec<DependencyGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyGroup {
    #[serde(default)]
    target_framework: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatIndex {
    #[serde(default)]
    versions: Vec<String>,
}

/// Blocking NuGet v3 client for one public registry and any number of
/// private feeds.
#[derive(Debug)]
pub struct NuGetClient {
    http: Client,
    public: RegistrySource,
    private: Vec<RegistrySource>,
}

impl NuGetClient {
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(
        settings: &Settings,
        public: RegistrySource,
        private: Vec<RegistrySource>,
    ) -> Result<Self> {
        Ok(Self {
            http: build_http_client(settings)?,
            public,
            private,
        })
    }

    /// Looks a package up in a single source: the registration index first,
    /// then the flat container when registration has nothing.
    ///
    /// # Errors
    /// See [`PackageSource::lookup_public`].
    pub fn lookup_in(
        &self,
        source: &RegistrySource,
        package: &str,
    ) -> Result<PackageIndex, RegistryError> {
        let id = package.to_ascii_lowercase();
        let versions = match self.registration_versions(source, &id, package) {
            Ok(versions) if !versions.is_empty() => versions,
            Ok(_) => {
                debug!(package, source = source.base_url(), "registration empty, using flat container");
                self.flat_container_versions(source, &id, package)?
            }
            Err(err) if err.is_not_found() => {
                debug!(package, source = source.base_url(), "no registration, using flat container");
                self.flat_container_versions(source, &id, package)?
            }
            Err(err) => return Err(err),
        };
        Ok(PackageIndex {
            source_url: source.base_url().to_string(),
            versions,
        })
    }

    fn registration_versions(
        &self,
        source: &RegistrySource,
        id: &str,
        package: &str,
    ) -> Result<Vec<VersionEntry>, RegistryError> {
        let index: RegistrationIndex =
            self.get_json(source, &source.registration_url(id), package)?;
        let mut versions = Vec::new();
        for page in index.items {
            let leaves = match page.items {
                Some(leaves) => leaves,
                None => {
                    let fetched: RegistrationPage = self.get_json(source, &page.id, package)?;
                    fetched.items.unwrap_or_default()
                }
            };
            for leaf in leaves {
                let entry = leaf.catalog_entry;
                if entry.listed == Some(false) {
                    continue;
                }
                versions.push(VersionEntry::new(
                    entry.version,
                    support_from_groups(&entry.dependency_groups),
                ));
            }
        }
        Ok(versions)
    }

    /// The flat container only lists version strings, so compatibility is
    /// read from the manifest of the highest one and only that version is
    /// offered as a candidate.
    fn flat_container_versions(
        &self,
        source: &RegistrySource,
        id: &str,
        package: &str,
    ) -> Result<Vec<VersionEntry>, RegistryError> {
        let index: FlatIndex = self.get_json(source, &source.flat_index_url(id), package)?;
        let Some(latest) = index
            .versions
            .iter()
            .max_by(|a, b| PackageVersion::parse(a).cmp(&PackageVersion::parse(b)))
        else {
            return Err(RegistryError::NotFound {
                package: package.to_string(),
                source_url: source.base_url().to_string(),
            });
        };
        let url = source.nuspec_url(id, latest);
        let manifest = self.get_text(source, &url, package)?;
        let support = parse_nuspec_support(&manifest).map_err(|err| RegistryError::Decode {
            url: url.clone(),
            message: format!("{err:#}"),
        })?;
        Ok(vec![VersionEntry::new(latest.clone(), support)])
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        source: &RegistrySource,
        url: &str,
        package: &str,
    ) -> Result<T, RegistryError> {
        let body = self.get_text(source, url, package)?;
        serde_json::from_str(&body).map_err(|err| RegistryError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn get_text(
        &self,
        source: &RegistrySource,
        url: &str,
        package: &str,
    ) -> Result<String, RegistryError> {
        debug!(url, "registry request");
        let response = self
            .request(source, url)
            .send()
            .map_err(RegistryError::Transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                package: package.to_string(),
                source_url: source.base_url().to_string(),
            });
        }
        if !status.is_success() {
            return Err(RegistryError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.text().map_err(RegistryError::Transport)
    }

    fn request(&self, source: &RegistrySource, url: &str) -> RequestBuilder {
        let request = self.http.get(url);
        match source.credentials() {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }
}

impl PackageSource for NuGetClient {
    fn lookup_public(&self, package: &str) -> Result<PackageIndex, RegistryError> {
        self.lookup_in(&self.public, package)
    }

    fn lookup_private(&self, package: &str) -> Result<PackageIndex, RegistryError> {
        for source in &self.private {
            match self.lookup_in(source, package) {
                Ok(index) => return Ok(index),
                Err(err) => debug!(package, source = source.base_url(), %err, "private source miss"),
            }
        }
        Err(RegistryError::NotFound {
            package: package.to_string(),
            source_url: "private sources".to_string(),
        })
    }

    fn has_private_sources(&self) -> bool {
        !self.private.is_empty()
    }
}

fn support_from_groups(groups: &[DependencyGroup]) -> FrameworkSupport {
    if groups.is_empty() {
        return FrameworkSupport::Any;
    }
    let mut frameworks = Vec::new();
    for group in groups {
        match group
            .target_framework
            .as_deref()
            .and_then(normalize_registry_framework)
        {
            Some(short) => {
                if !frameworks.contains(&short) {
                    frameworks.push(short);
                }
            }
            None => return FrameworkSupport::Any,
        }
    }
    FrameworkSupport::Frameworks(frameworks)
}
