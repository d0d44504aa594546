//! Resource and tool registry: the set of static resources, resource
//! templates, and tools a server exposes, plus the handlers that answer
//! `read_resource` and `call_tool`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use mcp_core::{McpError, McpResult};
use mcp_protocol::{Capabilities, ContentItem, Resource, ResourceTemplate, Tool};
use mcp_uri_template::Template;

/// Future type returned by handler trait methods. Handlers are the one
/// dynamic-dispatch boundary below the transport trait itself: the registry
/// only ever calls through these two fixed signatures.
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = McpResult<T>> + Send>>;

/// Answers `read_resource` for any URI the registry recognizes (static or
/// template-matched). A server installs exactly one.
pub trait ResourceHandler: Send + Sync {
    /// Produce content for `uri`. Called on cache miss only.
    fn read(&self, uri: &str) -> HandlerFuture<Vec<ContentItem>>;
}

/// Answers `call_tool` for one named tool.
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with its (already-parsed) arguments, returning its
    /// content items and whether the call is an application-level error.
    fn call(&self, arguments: Value) -> HandlerFuture<(Vec<ContentItem>, bool)>;
}

struct TemplateEntry {
    template: ResourceTemplate,
    compiled: Template,
}

/// The set of resources, templates, and tools a server exposes, plus their
/// handlers. Built once via [`Registry::builder`], then shared read-only
/// across worker tasks behind an `Arc`.
pub struct Registry {
    capabilities: Capabilities,
    resources: Vec<Resource>,
    templates: Vec<TemplateEntry>,
    tools: Vec<Tool>,
    tool_handlers: HashMap<String, Arc<dyn ToolHandler>>,
    resource_handler: Option<Arc<dyn ResourceHandler>>,
}

impl Registry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Capabilities this registry advertises (resources/tools toggles).
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The statically registered resources, for `list_resources`.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// The registered resource templates, for `list_resource_templates`.
    #[must_use]
    pub fn resource_templates(&self) -> Vec<&ResourceTemplate> {
        self.templates.iter().map(|e| &e.template).collect()
    }

    /// The registered tools, for `list_tools`.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// `true` if `uri` matches a static resource or a registered template.
    #[must_use]
    pub fn recognizes_uri(&self, uri: &str) -> bool {
        self.resources.iter().any(|r| r.uri == uri)
            || self.templates.iter().any(|e| e.compiled.matches(uri))
    }

    /// Read a resource by delegating to the registered handler. Callers are
    /// expected to check the cache before reaching here.
    ///
    /// # Errors
    /// Returns [`mcp_core::ErrorKind::ResourceNotFound`] if no handler is
    /// registered or the URI matches nothing registered, and propagates the
    /// handler's own error otherwise.
    pub async fn read_resource(&self, uri: &str) -> McpResult<Vec<ContentItem>> {
        if !self.recognizes_uri(uri) {
            return Err(McpError::resource_not_found(uri));
        }
        let handler = self
            .resource_handler
            .as_ref()
            .ok_or_else(|| McpError::resource_not_found(uri))?;
        let content = handler.read(uri).await?;
        if content.is_empty() {
            return Err(McpError::internal("resource handler returned no content"));
        }
        Ok(content)
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    /// Returns [`mcp_core::ErrorKind::ToolNotFound`] if `name` is not
    /// registered, and propagates the handler's own error otherwise.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<(Vec<ContentItem>, bool)> {
        let handler = self
            .tool_handlers
            .get(name)
            .ok_or_else(|| McpError::tool_not_found(name))?;
        let (content, is_error) = handler.call(arguments).await?;
        if content.is_empty() {
            return Err(McpError::internal("tool handler returned no content"));
        }
        Ok((content, is_error))
    }
}

/// Builder for [`Registry`]. Enforces the unique-name/unique-URI invariants
/// at build time rather than scattering checks through the hot path.
#[derive(Default)]
pub struct RegistryBuilder {
    capabilities: Capabilities,
    resources: Vec<Resource>,
    templates: Vec<TemplateEntry>,
    tools: Vec<Tool>,
    tool_handlers: HashMap<String, Arc<dyn ToolHandler>>,
    resource_handler: Option<Arc<dyn ResourceHandler>>,
}

impl RegistryBuilder {
    /// Register a static resource.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.capabilities.resources = true;
        self.resources.push(resource);
        self
    }

    /// Register a resource template. Returns an error if `uri_template`
    /// fails to parse.
    ///
    /// # Errors
    /// Propagates [`mcp_uri_template::Template::parse`]'s parse error.
    pub fn resource_template(mut self, template: ResourceTemplate) -> McpResult<Self> {
        let compiled = Template::parse(&template.uri_template)?;
        self.capabilities.resources = true;
        self.templates.push(TemplateEntry { template, compiled });
        Ok(self)
    }

    /// Install the single handler that answers `read_resource` for every
    /// registered static resource and template.
    #[must_use]
    pub fn resource_handler(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resource_handler = Some(handler);
        self
    }

    /// Register a tool and its handler together.
    #[must_use]
    pub fn tool(mut self, tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        self.capabilities.tools = true;
        self.tool_handlers.insert(tool.name.clone(), handler);
        self.tools.push(tool);
        self
    }

    /// Finish building, checking the registry's uniqueness invariants.
    ///
    /// # Errors
    /// Returns [`mcp_core::ErrorKind::Configuration`] on a duplicate tool
    /// name or a duplicate static resource URI.
    pub fn build(self) -> McpResult<Registry> {
        let mut seen_uris = std::collections::HashSet::with_capacity(self.resources.len());
        for r in &self.resources {
            if !seen_uris.insert(r.uri.as_str()) {
                return Err(McpError::new(
                    mcp_core::ErrorKind::Configuration,
                    format!("duplicate resource uri: {}", r.uri),
                ));
            }
        }
        let mut seen_names = std::collections::HashSet::with_capacity(self.tools.len());
        for t in &self.tools {
            if !seen_names.insert(t.name.as_str()) {
                return Err(McpError::new(
                    mcp_core::ErrorKind::Configuration,
                    format!("duplicate tool name: {}", t.name),
                ));
            }
        }
        Ok(Registry {
            capabilities: self.capabilities,
            resources: self.resources,
            templates: self.templates,
            tools: self.tools,
            tool_handlers: self.tool_handlers,
            resource_handler: self.resource_handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::{ParamSchema, ParamType};

    struct EchoHandler;
    impl ToolHandler for EchoHandler {
        fn call(&self, arguments: Value) -> HandlerFuture<(Vec<ContentItem>, bool)> {
            Box::pin(async move {
                let text = arguments
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok((vec![ContentItem::text(text)], false))
            })
        }
    }

    struct StaticResourceHandler;
    impl ResourceHandler for StaticResourceHandler {
        fn read(&self, _uri: &str) -> HandlerFuture<Vec<ContentItem>> {
            Box::pin(async move { Ok(vec![ContentItem::text("v1")]) })
        }
    }

    #[tokio::test]
    async fn call_tool_dispatches_to_registered_handler() {
        let tool = Tool::new("echo").with_param(ParamSchema::required("text", ParamType::String));
        let registry = Registry::builder()
            .tool(tool, Arc::new(EchoHandler))
            .build()
            .unwrap();
        let (content, is_error) = registry
            .call_tool("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(!is_error);
        assert_eq!(content.len(), 1);
    }

    #[tokio::test]
    async fn call_tool_unknown_name_is_not_found() {
        let registry = Registry::builder().build().unwrap();
        let err = registry.call_tool("nope", Value::Null).await.unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn read_resource_uses_handler_for_recognized_static_uri() {
        let registry = Registry::builder()
            .resource(Resource::new("x"))
            .resource_handler(Arc::new(StaticResourceHandler))
            .build()
            .unwrap();
        let content = registry.read_resource("x").await.unwrap();
        assert_eq!(content.len(), 1);
    }

    #[tokio::test]
    async fn read_resource_rejects_unrecognized_uri() {
        let registry = Registry::builder()
            .resource_handler(Arc::new(StaticResourceHandler))
            .build()
            .unwrap();
        let err = registry.read_resource("nope").await.unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::ResourceNotFound);
    }

    #[test]
    fn build_rejects_duplicate_tool_names() {
        let make = || Tool::new("dup");
        let err = Registry::builder()
            .tool(make(), Arc::new(EchoHandler))
            .tool(make(), Arc::new(EchoHandler))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::Configuration);
    }

    #[test]
    fn build_rejects_duplicate_resource_uris() {
        let err = Registry::builder()
            .resource(Resource::new("dup").with_name("a"))
            .resource(Resource::new("dup").with_name("b"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::Configuration);
    }
}
