use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use netmig_domain::normalize_registry_framework;

use super::FrameworkSupport;

/// Reads the dependency groups of a `.nuspec` manifest. The nuspec schema
/// namespace varies between versions, so elements are matched by local name.
pub(crate) fn parse_nuspec_support(contents: &str) -> Result<FrameworkSupport> {
    let mut reader = Reader::from_str(contents);
    let mut in_dependencies = false;
    let mut frameworks = Vec::new();
    let mut saw_group = false;

    loop {
        match reader.read_event().context("nuspec is not well-formed XML")? {
            Event::Start(element) if element.local_name().as_ref() == b"dependencies" => {
                in_dependencies = true;
            }
            Event::End(element) if element.local_name().as_ref() == b"dependencies" => {
                in_dependencies = false;
            }
            Event::Start(element) | Event::Empty(element)
                if in_dependencies && element.local_name().as_ref() == b"group" =>
            {
                saw_group = true;
                let framework = match element
                    .try_get_attribute("targetFramework")
                    .context("malformed group attribute")?
                {
                    Some(attr) => attr
                        .unescape_value()
                        .context("invalid targetFramework value")?
                        .into_owned(),
                    None => String::new(),
                };
                match normalize_registry_framework(&framework) {
                    Some(short) => {
                        if !frameworks.contains(&short) {
                            frameworks.push(short);
                        }
                    }
                    None => return Ok(FrameworkSupport::Any),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if saw_group {
        Ok(FrameworkSupport::Frameworks(frameworks))
    } else {
        Ok(FrameworkSupport::Any)
    }
}
