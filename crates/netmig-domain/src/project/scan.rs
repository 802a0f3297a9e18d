use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;
use walkdir::WalkDir;

use super::descriptor::{
    DescriptorShape, DescriptorText, FrameworkProperty, PackageReference, ProjectDescriptor,
    VersionForm,
};

const DESCRIPTOR_EXTENSIONS: &[&str] = &["csproj", "fsproj"];
const SKIPPED_DIRS: &[&str] = &["bin", "obj", ".git", "node_modules", ".vs"];

/// Lists project descriptors under `root` in a stable, path-sorted order.
///
/// # Errors
/// Returns an error if the tree cannot be walked.
pub fn discover_descriptors(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_descriptor = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                DESCRIPTOR_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_descriptor {
            found.push(entry.into_path());
        }
    }
    tracing::debug!(root = %root.display(), count = found.len(), "discovered project descriptors");
    Ok(found)
}

/// Reads and parses one project descriptor.
///
/// # Errors
/// Returns an error when the file cannot be read or is not a usable MSBuild
/// project document.
pub fn scan(path: &Path) -> Result<ProjectDescriptor> {
    let text = DescriptorText::read(path)?;
    parse_descriptor(path, &text.body)
        .with_context(|| format!("failed to parse {}", path.display()))
}

enum Capture {
    Property(FrameworkProperty),
    ReferenceVersion,
}

/// Parses descriptor text. The layout is chosen up front by
/// [`DescriptorShape::detect`]; only elements in that layout's namespace are
/// considered.
///
/// # Errors
/// Returns an error for malformed XML.
pub fn parse_descriptor(path: &Path, contents: &str) -> Result<ProjectDescriptor> {
    let shape = DescriptorShape::detect(contents)?;
    let mut reader = NsReader::from_str(contents);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut properties: Vec<(FrameworkProperty, String)> = Vec::new();
    let mut packages = Vec::new();
    let mut open_reference: Option<PackageReference> = None;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        let (in_scope, event) = {
            let (ns, event) = reader
                .read_resolved_event()
                .context("descriptor is not well-formed XML")?;
            (shape.accepts(&ns), event)
        };
        match event {
            Event::Start(element) => {
                let local = element.local_name().as_ref().to_vec();
                if in_scope {
                    let parent = stack.last().map(Vec::as_slice);
                    match (parent, local.as_slice()) {
                        (Some(b"PropertyGroup"), name) => {
                            if let Some(property) = FrameworkProperty::from_element(name) {
                                capture = Some(Capture::Property(property));
                                text.clear();
                            }
                        }
                        (Some(b"ItemGroup"), b"PackageReference") => {
                            open_reference = reference_from(&element)?;
                        }
                        (Some(b"PackageReference"), b"Version") if open_reference.is_some() => {
                            capture = Some(Capture::ReferenceVersion);
                            text.clear();
                        }
                        _ => {}
                    }
                }
                stack.push(if in_scope { local } else { Vec::new() });
            }
            Event::Empty(element) => {
                let parent = stack.last().map(Vec::as_slice);
                if in_scope
                    && parent == Some(b"ItemGroup".as_slice())
                    && element.local_name().as_ref() == b"PackageReference"
                {
                    if let Some(reference) = reference_from(&element)? {
                        packages.push(reference);
                    }
                }
            }
            Event::Text(chunk) => {
                if capture.is_some() {
                    text.push_str(&chunk.unescape().context("invalid text content")?);
                }
            }
            Event::CData(chunk) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&chunk));
                }
            }
            Event::End(_) => {
                let closed = stack.pop().unwrap_or_default();
                match capture.take() {
                    Some(Capture::Property(property)) => {
                        let value = text.trim();
                        if !value.is_empty() && !properties.iter().any(|(p, _)| *p == property) {
                            properties.push((property, value.to_string()));
                        }
                    }
                    Some(Capture::ReferenceVersion) => {
                        if let Some(reference) = open_reference.as_mut() {
                            if reference.form == VersionForm::Missing {
                                reference.version = text.trim().to_string();
                                reference.form = VersionForm::Element;
                            }
                        }
                    }
                    None => {}
                }
                if closed == b"PackageReference" {
                    if let Some(reference) = open_reference.take() {
                        packages.push(reference);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (framework_property, target_frameworks) = select_frameworks(&properties);
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("project")
        .to_string();

    Ok(ProjectDescriptor {
        name,
        path: path.to_path_buf(),
        shape,
        framework_property,
        target_frameworks,
        packages,
    })
}

fn reference_from(element: &BytesStart<'_>) -> Result<Option<PackageReference>> {
    let mut name = None;
    let mut version = None;
    for attr in element.attributes() {
        let attr = attr.context("malformed PackageReference attribute")?;
        let value = attr
            .unescape_value()
            .context("invalid PackageReference attribute value")?;
        match attr.key.local_name().as_ref() {
            b"Include" => name = Some(value.trim().to_string()),
            b"Version" => version = Some(value.trim().to_string()),
            _ => {}
        }
    }
    // `Update`/`Remove` items modify references declared elsewhere.
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        return Ok(None);
    };
    Ok(Some(match version {
        Some(version) => PackageReference {
            name,
            version,
            form: VersionForm::Attribute,
        },
        None => PackageReference {
            name,
            version: String::new(),
            form: VersionForm::Missing,
        },
    }))
}

fn select_frameworks(
    properties: &[(FrameworkProperty, String)],
) -> (Option<FrameworkProperty>, Vec<String>) {
    for candidate in FrameworkProperty::SINGLE {
        if let Some((_, value)) = properties.iter().find(|(p, _)| *p == candidate) {
            return (Some(candidate), vec![value.clone()]);
        }
    }
    if let Some((_, value)) = properties
        .iter()
        .find(|(p, _)| *p == FrameworkProperty::TargetFrameworks)
    {
        let monikers: Vec<String> = value
            .split(';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
            .collect();
        if !monikers.is_empty() {
            return (Some(FrameworkProperty::TargetFrameworks), monikers);
        }
    }
    (None, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::TargetFramework;
    use std::fs;
    use tempfile::tempdir;

    const SDK_PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>netcoreapp3.1</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="12.0.1" />
    <PackageReference Include="Serilog">
      <Version>2.10.0</Version>
    </PackageReference>
    <PackageReference Update="Ignored.Package" Version="1.0.0" />
    <PackageReference Include="Central.Managed" />
  </ItemGroup>
</Project>
"#;

    const LEGACY_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <TargetFrameworkVersion>v4.7.2</TargetFrameworkVersion>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Dapper">
      <Version>1.50.5</Version>
    </PackageReference>
  </ItemGroup>
</Project>
"#;

    #[test]
    fn parses_sdk_shape_references() -> Result<()> {
        let descriptor = parse_descriptor(Path::new("src/App/App.csproj"), SDK_PROJECT)?;
        assert_eq!(descriptor.name, "App");
        assert_eq!(descriptor.shape, DescriptorShape::Sdk);
        assert_eq!(descriptor.moniker(), Some("netcoreapp3.1"));
        assert_eq!(
            descriptor.framework_property,
            Some(FrameworkProperty::TargetFramework)
        );
        let names: Vec<(&str, &str, VersionForm)> = descriptor
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str(), p.form))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Newtonsoft.Json", "12.0.1", VersionForm::Attribute),
                ("Serilog", "2.10.0", VersionForm::Element),
                ("Central.Managed", "", VersionForm::Missing),
            ]
        );
        assert!(descriptor.needs_migration(&TargetFramework::parse("net8.0")));
        Ok(())
    }

    #[test]
    fn parses_legacy_namespaced_shape() -> Result<()> {
        let descriptor = parse_descriptor(Path::new("Legacy.csproj"), LEGACY_PROJECT)?;
        assert_eq!(descriptor.shape, DescriptorShape::Legacy);
        assert_eq!(descriptor.moniker(), Some("v4.7.2"));
        assert_eq!(descriptor.packages.len(), 1);
        assert_eq!(descriptor.packages[0].name, "Dapper");
        assert_eq!(descriptor.packages[0].version, "1.50.5");
        Ok(())
    }

    #[test]
    fn legacy_shape_ignores_elements_outside_the_msbuild_namespace() -> Result<()> {
        let contents = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003" xmlns:x="urn:other">
  <ItemGroup>
    <x:PackageReference Include="Foreign" Version="1.0.0" />
    <PackageReference Include="Native" Version="2.0.0" />
  </ItemGroup>
</Project>"#;
        let descriptor = parse_descriptor(Path::new("Ns.csproj"), contents)?;
        let names: Vec<&str> = descriptor.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Native"]);
        Ok(())
    }

    #[test]
    fn single_target_property_wins_over_multi_target() -> Result<()> {
        let contents = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks>net6.0;netstandard2.0</TargetFrameworks>
  </PropertyGroup>
  <PropertyGroup>
    <TargetFramework>net7.0</TargetFramework>
  </PropertyGroup>
</Project>"#;
        let descriptor = parse_descriptor(Path::new("Lib.csproj"), contents)?;
        assert_eq!(descriptor.target_frameworks, vec!["net7.0"]);
        Ok(())
    }

    #[test]
    fn multi_target_uses_first_token() -> Result<()> {
        let contents = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks> net6.0 ; netstandard2.0 ;</TargetFrameworks>
  </PropertyGroup>
</Project>"#;
        let descriptor = parse_descriptor(Path::new("Lib.csproj"), contents)?;
        assert_eq!(
            descriptor.framework_property,
            Some(FrameworkProperty::TargetFrameworks)
        );
        assert_eq!(descriptor.moniker(), Some("net6.0"));
        assert_eq!(descriptor.target_frameworks, vec!["net6.0", "netstandard2.0"]);
        Ok(())
    }

    #[test]
    fn discovery_skips_build_output_and_sorts() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        for rel in [
            "src/b/B.csproj",
            "src/a/A.fsproj",
            "src/a/bin/Debug/Copy.csproj",
            "src/a/obj/Generated.csproj",
            "README.md",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().expect("parent"))?;
            fs::write(&path, "<Project />")?;
        }
        let found = discover_descriptors(root)?;
        let rel: Vec<String> = found
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(rel, vec!["src/a/A.fsproj", "src/b/B.csproj"]);
        Ok(())
    }

    #[test]
    fn scan_reads_files_with_byte_order_mark() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("Bom.csproj");
        fs::write(&path, format!("\u{feff}{SDK_PROJECT}"))?;
        let descriptor = scan(&path)?;
        assert_eq!(descriptor.packages.len(), 3);
        Ok(())
    }
}
