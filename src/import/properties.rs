//! Properties and context item parsers

use crate::models::{DocumentKind, JobProperties, ParsedDocument, Screenshot};
use crate::xml::XmlElement;

use super::job::parse_context;

/// Parse a properties document (`xmi:XMI` root or a bare `Property`)
pub fn parse_properties(root: &XmlElement) -> ParsedDocument {
    let property = if root.name == "Property" {
        Some(root)
    } else {
        root.child("Property")
    };

    let mut screenshots = Vec::new();
    collect_screenshots(root, &mut screenshots);

    ParsedDocument {
        kind: DocumentKind::Properties,
        properties: property.map(parse_property),
        screenshots,
        ..Default::default()
    }
}

fn parse_property(element: &XmlElement) -> JobProperties {
    // Newer exports reference the author by href; older ones inline a login
    let author = element.attr_owned("author").or_else(|| {
        element
            .child("author")
            .and_then(|a| a.attr_owned("login").or_else(|| a.attr_owned("href")))
    });

    JobProperties {
        id: element.attr_owned("id"),
        label: element.attr_owned("label"),
        version: element.attr_owned("version"),
        purpose: element.attr_owned("purpose"),
        description: element.attr_owned("description"),
        creation_date: element.attr_owned("creationDate"),
        modification_date: element.attr_owned("modificationDate"),
        author,
        status_code: element.attr_owned("statusCode"),
        additional: element
            .children_named("additionalProperties")
            .filter_map(|p| Some((p.attr_owned("key")?, p.attr_owned("value").unwrap_or_default())))
            .collect(),
    }
}

fn collect_screenshots(element: &XmlElement, out: &mut Vec<Screenshot>) {
    for child in &element.children {
        if child.name == "screenshots" {
            out.push(Screenshot {
                key: child.attr_owned("key"),
                encoded_len: child.attr("value").map(str::len).unwrap_or(0),
            });
        } else {
            collect_screenshots(child, out);
        }
    }
}

/// Parse a repository context group (`ContextType` root)
pub fn parse_context_item(root: &XmlElement) -> ParsedDocument {
    let group = root.attr_owned("name");

    let contexts = root
        .children_named("context")
        .map(|c| {
            let mut context = parse_context(c);
            // Qualify environment names with the group they belong to
            if let (Some(group), Some(name)) = (&group, &context.name) {
                context.name = Some(format!("{}.{}", group, name));
            }
            context
        })
        .collect();

    ParsedDocument {
        kind: DocumentKind::ContextItem,
        contexts,
        ..Default::default()
    }
}
