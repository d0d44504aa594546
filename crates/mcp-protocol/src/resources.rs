//! Resources and resource templates.

use serde::{Deserialize, Serialize};

use crate::content::ContentItem;

/// A named, URI-addressable piece of content exposed by a server.
///
/// Immutable once registered; owned by the registry. Resource URIs are
/// unique within the set of static resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    /// The resource's URI. Unique among static resources.
    pub uri: String,
    /// Programmatic/display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type of the resource's content, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource {
    /// Construct a resource with just a URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            mime_type: None,
            description: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A resource whose URI contains typed, optional, or defaulted placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceTemplate {
    /// The template string, e.g. `example://{name}/{version:float=1.0}`.
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// Programmatic/display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type of resources generated from this template, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResourceTemplate {
    /// Construct a template from its pattern string.
    #[must_use]
    pub fn new(uri_template: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: None,
            mime_type: None,
            description: None,
        }
    }
}

/// Result of `list_resources`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListResourcesResult {
    /// The registered static resources.
    pub resources: Vec<Resource>,
}

/// Result of `list_resource_templates`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListResourceTemplatesResult {
    /// The registered resource templates.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
}

/// Result of `read_resource`: binary content omits `text` rather than
/// base64-encoding the payload — left that way deliberately, see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// The resource's content items.
    pub contents: Vec<ContentItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let r = Resource::new("file:///a.txt")
            .with_name("a")
            .with_mime_type("text/plain")
            .with_description("a file");
        assert_eq!(r.uri, "file:///a.txt");
        assert_eq!(r.name.as_deref(), Some("a"));
        assert_eq!(r.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn list_resources_result_serializes_without_extra_fields() {
        let result = ListResourcesResult {
            resources: vec![Resource::new("x://y")],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["resources"][0]["uri"], "x://y");
        assert!(json["resources"][0].get("name").is_none());
    }
}
