use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::framework::TargetFramework;

pub(crate) const MSBUILD_NAMESPACE: &[u8] = b"http://schemas.microsoft.com/developer/msbuild/2003";

const UTF8_BOM: char = '\u{feff}';

/// Which of the two descriptor layouts a project file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorShape {
    /// SDK-style project: no default namespace, versions usually attributes.
    Sdk,
    /// Pre-SDK project: every element lives in the MSBuild 2003 namespace.
    Legacy,
}

impl DescriptorShape {
    /// Probes the root element. A root that declares the MSBuild namespace
    /// selects the legacy layout; anything else is treated as SDK-style.
    ///
    /// # Errors
    /// Returns an error when the document has no root element or is not XML.
    pub fn detect(contents: &str) -> Result<Self> {
        let mut reader = Reader::from_str(contents);
        loop {
            match reader.read_event().context("descriptor is not well-formed XML")? {
                Event::Start(root) | Event::Empty(root) => {
                    for attr in root.attributes() {
                        let attr = attr.context("malformed attribute on root element")?;
                        if attr.key.as_ref() == b"xmlns" && attr.value.as_ref() == MSBUILD_NAMESPACE
                        {
                            return Ok(Self::Legacy);
                        }
                    }
                    return Ok(Self::Sdk);
                }
                Event::Eof => anyhow::bail!("descriptor has no root element"),
                _ => {}
            }
        }
    }

    /// Whether an element's resolved namespace belongs to this layout.
    pub(crate) fn accepts(self, ns: &ResolveResult<'_>) -> bool {
        match self {
            Self::Sdk => matches!(ns, ResolveResult::Unbound),
            Self::Legacy => {
                matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == MSBUILD_NAMESPACE)
            }
        }
    }
}

/// The MSBuild property a project's moniker was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameworkProperty {
    TargetFramework,
    TargetFrameworkVersion,
    TargetFrameworks,
}

impl FrameworkProperty {
    /// Single-value properties in lookup order; the multi-target property is
    /// only consulted when none of these is populated.
    pub(crate) const SINGLE: [Self; 2] = [Self::TargetFramework, Self::TargetFrameworkVersion];

    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            Self::TargetFramework => "TargetFramework",
            Self::TargetFrameworkVersion => "TargetFrameworkVersion",
            Self::TargetFrameworks => "TargetFrameworks",
        }
    }

    pub(crate) fn from_element(name: &[u8]) -> Option<Self> {
        match name {
            b"TargetFramework" => Some(Self::TargetFramework),
            b"TargetFrameworkVersion" => Some(Self::TargetFrameworkVersion),
            b"TargetFrameworks" => Some(Self::TargetFrameworks),
            _ => None,
        }
    }
}

/// Where a reference declares its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionForm {
    Attribute,
    Element,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReference {
    pub name: String,
    pub version: String,
    pub form: VersionForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub shape: DescriptorShape,
    pub framework_property: Option<FrameworkProperty>,
    /// Every declared moniker; the first one drives migration decisions.
    pub target_frameworks: Vec<String>,
    pub packages: Vec<PackageReference>,
}

impl ProjectDescriptor {
    #[must_use]
    pub fn moniker(&self) -> Option<&str> {
        self.target_frameworks.first().map(String::as_str)
    }

    #[must_use]
    pub fn framework(&self) -> Option<TargetFramework> {
        self.moniker().map(TargetFramework::parse)
    }

    #[must_use]
    pub fn needs_migration(&self, target: &TargetFramework) -> bool {
        self.framework()
            .is_some_and(|framework| framework.needs_migration(target))
    }
}

/// Descriptor text with any byte-order mark split off so it can be put back
/// on write.
#[derive(Debug, Clone)]
pub(crate) struct DescriptorText {
    pub(crate) bom: bool,
    pub(crate) body: String,
}

impl DescriptorText {
    pub(crate) fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::from_raw(raw))
    }

    pub(crate) fn from_raw(raw: String) -> Self {
        match raw.strip_prefix(UTF8_BOM) {
            Some(body) => Self {
                bom: true,
                body: body.to_string(),
            },
            None => Self {
                bom: false,
                body: raw,
            },
        }
    }

    pub(crate) fn write(&self, path: &Path, body: &str) -> Result<()> {
        let mut out = String::with_capacity(body.len() + 3);
        if self.bom {
            out.push(UTF8_BOM);
        }
        out.push_str(body);
        fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_legacy_namespace_on_root() -> Result<()> {
        let legacy = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
</Project>"#;
        assert_eq!(DescriptorShape::detect(legacy)?, DescriptorShape::Legacy);

        let sdk = r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#;
        assert_eq!(DescriptorShape::detect(sdk)?, DescriptorShape::Sdk);
        Ok(())
    }

    #[test]
    fn detect_rejects_empty_documents() {
        assert!(DescriptorShape::detect("").is_err());
    }

    #[test]
    fn byte_order_mark_is_split_off() {
        let text = DescriptorText::from_raw("\u{feff}<Project />".to_string());
        assert!(text.bom);
        assert_eq!(text.body, "<Project />");
    }
}
