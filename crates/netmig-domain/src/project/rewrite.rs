//! In-place edits of project descriptors.
//!
//! Edits stream the document through `quick-xml` and re-emit every event, so
//! comments, whitespace and unrelated elements survive untouched. An edited
//! attribute value is spliced into the element's original bytes.

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{NsReader, Writer};

use super::descriptor::{DescriptorShape, DescriptorText, FrameworkProperty};

/// Sets the version of the `occurrence`-th (zero-based, document order)
/// reference named exactly `package` and persists the file. Returns `false`,
/// leaving the file alone, when no such reference exists or it already
/// carries `new_version`.
///
/// # Errors
/// Returns an error when the file cannot be read, parsed or written.
pub fn rewrite_package_version(
    path: &Path,
    package: &str,
    occurrence: usize,
    new_version: &str,
) -> Result<bool> {
    let text = DescriptorText::read(path)?;
    match set_package_version(&text.body, package, occurrence, new_version)
        .with_context(|| format!("failed to rewrite {}", path.display()))?
    {
        Some(updated) => {
            text.write(path, &updated)?;
            tracing::debug!(
                path = %path.display(),
                package,
                occurrence,
                version = new_version,
                "package version rewritten"
            );
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Replaces `from` with `to` in the first `property` element that declares it
/// and persists the file. Returns `false` when nothing matched.
///
/// # Errors
/// Returns an error when the file cannot be read, parsed or written.
pub fn rewrite_target_framework(
    path: &Path,
    property: FrameworkProperty,
    from: &str,
    to: &str,
) -> Result<bool> {
    let text = DescriptorText::read(path)?;
    match set_target_framework(&text.body, property, from, to)
        .with_context(|| format!("failed to retarget {}", path.display()))?
    {
        Some(updated) => {
            text.write(path, &updated)?;
            tracing::debug!(path = %path.display(), from, to, "target framework rewritten");
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReferenceState {
    Searching,
    /// Inside the matching reference, which had no `Version` attribute.
    InReference,
    InVersion,
    Done,
}

/// Pure form of [`rewrite_package_version`]: returns the edited document, or
/// `None` if the document would not change.
///
/// # Errors
/// Returns an error for malformed XML.
pub fn set_package_version(
    contents: &str,
    package: &str,
    occurrence: usize,
    new_version: &str,
) -> Result<Option<String>> {
    let shape = DescriptorShape::detect(contents)?;
    let mut reader = NsReader::from_str(contents);
    let mut writer = Writer::new(Vec::with_capacity(contents.len() + 16));
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut state = ReferenceState::Searching;
    let mut seen = 0usize;
    let mut changed = false;

    loop {
        let (in_scope, event) = {
            let (ns, event) = reader
                .read_resolved_event()
                .context("descriptor is not well-formed XML")?;
            (shape.accepts(&ns), event)
        };
        let parent = stack.last().map(Vec::as_slice);
        let mut replacement: Option<Event<'_>> = None;

        match &event {
            Event::Eof => break,
            Event::Start(element) | Event::Empty(element) => {
                let local = element.local_name().as_ref().to_vec();
                let is_empty = matches!(event, Event::Empty(_));
                let is_reference = in_scope
                    && state == ReferenceState::Searching
                    && parent == Some(b"ItemGroup".as_slice())
                    && local == b"PackageReference"
                    && include_matches(element, package)?;
                let targeted = is_reference && seen == occurrence;
                if is_reference {
                    seen += 1;
                }
                if targeted {
                    match replace_attribute(element, b"Version", new_version)? {
                        Some((rebuilt, differs)) => {
                            changed |= differs;
                            state = ReferenceState::Done;
                            replacement = Some(if is_empty {
                                Event::Empty(rebuilt)
                            } else {
                                Event::Start(rebuilt)
                            });
                        }
                        None if is_empty => state = ReferenceState::Done,
                        None => state = ReferenceState::InReference,
                    }
                } else if in_scope
                    && state == ReferenceState::InReference
                    && parent == Some(b"PackageReference".as_slice())
                    && local == b"Version"
                {
                    if is_empty {
                        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                        writer
                            .write_event(Event::Start(BytesStart::new(name.clone())))
                            .context("failed to write descriptor")?;
                        writer
                            .write_event(Event::Text(BytesText::new(new_version)))
                            .context("failed to write descriptor")?;
                        replacement = Some(Event::End(BytesEnd::new(name)));
                        changed = true;
                        state = ReferenceState::Done;
                    } else {
                        state = ReferenceState::InVersion;
                    }
                }
                if !is_empty {
                    stack.push(if in_scope { local } else { Vec::new() });
                }
            }
            Event::Text(current) if state == ReferenceState::InVersion => {
                let current = current.unescape().context("invalid text content")?;
                changed |= current.trim() != new_version;
                replacement = Some(Event::Text(BytesText::new(new_version)));
                state = ReferenceState::Done;
            }
            Event::End(_) => {
                let closed = stack.pop().unwrap_or_default();
                if state == ReferenceState::InVersion {
                    // `<Version></Version>` with no text at all.
                    writer
                        .write_event(Event::Text(BytesText::new(new_version)))
                        .context("failed to write descriptor")?;
                    changed = true;
                    state = ReferenceState::Done;
                } else if state == ReferenceState::InReference && closed == b"PackageReference" {
                    // Matched reference has no version of its own to edit.
                    state = ReferenceState::Done;
                }
            }
            _ => {}
        }

        writer
            .write_event(replacement.unwrap_or(event))
            .context("failed to write descriptor")?;
    }

    if !changed {
        return Ok(None);
    }
    let output = String::from_utf8(writer.into_inner()).context("descriptor output is not UTF-8")?;
    Ok(Some(output))
}

/// Pure form of [`rewrite_target_framework`].
///
/// For the multi-target property only the matching token is replaced.
///
/// # Errors
/// Returns an error for malformed XML.
pub fn set_target_framework(
    contents: &str,
    property: FrameworkProperty,
    from: &str,
    to: &str,
) -> Result<Option<String>> {
    let shape = DescriptorShape::detect(contents)?;
    let mut reader = NsReader::from_str(contents);
    let mut writer = Writer::new(Vec::with_capacity(contents.len() + 16));
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut inside_property = false;
    let mut changed = false;
    let element_name = property.element_name().as_bytes();

    loop {
        let (in_scope, event) = {
            let (ns, event) = reader
                .read_resolved_event()
                .context("descriptor is not well-formed XML")?;
            (shape.accepts(&ns), event)
        };
        let mut replacement: Option<Event<'_>> = None;

        match &event {
            Event::Eof => break,
            Event::Start(element) => {
                let local = element.local_name().as_ref().to_vec();
                inside_property = !changed
                    && in_scope
                    && stack.last().map(Vec::as_slice) == Some(b"PropertyGroup".as_slice())
                    && local == element_name;
                stack.push(if in_scope { local } else { Vec::new() });
            }
            Event::Text(current) if inside_property => {
                let current = current.unescape().context("invalid text content")?;
                if let Some(updated) = retarget_value(&current, property, from, to) {
                    replacement = Some(Event::Text(BytesText::from_escaped(
                        quick_xml::escape::escape(updated.as_str()).into_owned(),
                    )));
                    changed = true;
                }
                inside_property = false;
            }
            Event::End(_) => {
                stack.pop();
                inside_property = false;
            }
            _ => {}
        }

        writer
            .write_event(replacement.unwrap_or(event))
            .context("failed to write descriptor")?;
    }

    if !changed {
        return Ok(None);
    }
    let output = String::from_utf8(writer.into_inner()).context("descriptor output is not UTF-8")?;
    Ok(Some(output))
}

fn retarget_value(current: &str, property: FrameworkProperty, from: &str, to: &str) -> Option<String> {
    let trimmed = current.trim();
    match property {
        FrameworkProperty::TargetFrameworks => {
            let mut tokens: Vec<&str> = trimmed.split(';').map(str::trim).collect();
            let index = tokens.iter().position(|token| token.eq_ignore_ascii_case(from))?;
            let listed = tokens
                .iter()
                .enumerate()
                .any(|(i, token)| i != index && token.eq_ignore_ascii_case(to));
            // A second copy of the target would be rejected by MSBuild.
            if listed {
                tokens.remove(index);
            } else {
                tokens[index] = to;
            }
            Some(preserve_padding(current, trimmed, &tokens.join(";")))
        }
        FrameworkProperty::TargetFramework | FrameworkProperty::TargetFrameworkVersion => trimmed
            .eq_ignore_ascii_case(from)
            .then(|| preserve_padding(current, trimmed, to)),
    }
}

fn preserve_padding(original: &str, trimmed: &str, replacement: &str) -> String {
    let start = original.len() - original.trim_start().len();
    let end = start + trimmed.len();
    format!("{}{}{}", &original[..start], replacement, &original[end..])
}

fn include_matches(element: &BytesStart<'_>, package: &str) -> Result<bool> {
    for attr in element.attributes() {
        let attr = attr.context("malformed PackageReference attribute")?;
        if attr.key.as_ref() == b"Include" {
            let value = attr
                .unescape_value()
                .context("invalid PackageReference attribute value")?;
            return Ok(value.trim() == package);
        }
    }
    Ok(false)
}

/// Copies `element` with the value of attribute `key` replaced, keeping the
/// rest of the tag byte for byte. Returns `None` when the attribute is absent;
/// otherwise the edited element and whether the value actually changed.
fn replace_attribute(
    element: &BytesStart<'_>,
    key: &[u8],
    value: &str,
) -> Result<Option<(BytesStart<'static>, bool)>> {
    let mut current = None;
    for attr in element.attributes() {
        let attr = attr.context("malformed attribute")?;
        if attr.key.as_ref() == key {
            current = Some(
                attr.unescape_value()
                    .context("invalid attribute value")?
                    .into_owned(),
            );
            break;
        }
    }
    let Some(current) = current else {
        return Ok(None);
    };

    let raw: &[u8] = element;
    let name_len = element.name().as_ref().len();
    let span = attribute_value_span(raw, name_len, key)
        .context("attribute value could not be located in the element")?;
    let mut content = Vec::with_capacity(raw.len() + value.len());
    content.extend_from_slice(&raw[..span.start]);
    content.extend_from_slice(quick_xml::escape::escape(value).as_bytes());
    content.extend_from_slice(&raw[span.end..]);
    let content = String::from_utf8(content).context("element is not UTF-8")?;
    Ok(Some((
        BytesStart::from_content(content, name_len),
        current.trim() != value,
    )))
}

/// Byte range of the quoted value of attribute `key` inside a start tag's
/// content (name followed by attributes).
fn attribute_value_span(raw: &[u8], name_len: usize, key: &[u8]) -> Option<Range<usize>> {
    let skip_space = |mut pos: usize| {
        while raw.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        pos
    };
    let mut pos = name_len;
    loop {
        pos = skip_space(pos);
        let key_start = pos;
        while raw
            .get(pos)
            .is_some_and(|b| *b != b'=' && !b.is_ascii_whitespace())
        {
            pos += 1;
        }
        let found = &raw[key_start..pos];
        pos = skip_space(pos);
        if raw.get(pos) != Some(&b'=') {
            return None;
        }
        pos = skip_space(pos + 1);
        let quote = *raw.get(pos)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let start = pos + 1;
        let end = start + raw.get(start..)?.iter().position(|b| *b == quote)?;
        if found == key {
            return Some(start..end);
        }
        pos = end + 1;
    }
}
