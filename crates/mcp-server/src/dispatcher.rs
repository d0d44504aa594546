//! Request dispatcher: the single place that turns one raw JSON-RPC message
//! body into raw JSON-RPC response bytes (or nothing, for notifications).
//!
//! Wires together rate limiting, the worker-local scratch arena, the
//! resource cache, and the [`Registry`] behind the thread pool, matching the
//! pipeline `message_bytes -> parse -> route -> handler -> serialize ->
//! frame & send`. The transport's I/O thread calls [`Dispatcher::dispatch`];
//! everything past rate-limit admission runs on a worker task.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use mcp_core::arena::with_worker_arena;
use mcp_core::error_codes::APPLICATION_ERROR;
use mcp_core::jsonrpc::{IncomingMessage, JsonRpcError, JsonRpcResponse, RequestId, parse_incoming};
use mcp_core::{McpError, McpResult, methods};
use mcp_protocol::{CallToolResult, ListResourcesResult, ListResourceTemplatesResult, ListToolsResult, ReadResourceResult, ToolListing};
use mcp_cache::{ResourceCache, Ttl};

use crate::rate_limit::RateLimiter;
use crate::registry::Registry;
use crate::thread_pool::{PoolError, ThreadPool};

/// Tunables for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker pool size.
    pub worker_count: usize,
    /// Bounded submission queue depth.
    pub queue_capacity: usize,
    /// Requests admitted per client key per [`Self::rate_limit_window`].
    pub rate_limit_max_requests: u32,
    /// Rate-limit window length.
    pub rate_limit_window: Duration,
    /// Total resource-cache capacity across all stripes.
    pub cache_capacity: usize,
    /// Default cache entry TTL.
    pub cache_default_ttl: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1024,
            rate_limit_max_requests: 1000,
            rate_limit_window: Duration::from_secs(60),
            cache_capacity: 256,
            cache_default_ttl: Duration::from_millis(mcp_core::DEFAULT_CACHE_TTL_MS),
        }
    }
}

/// Dispatches incoming request bytes through rate limiting, routing, and the
/// registry, via a bounded worker pool.
pub struct Dispatcher {
    registry: Arc<Registry>,
    cache: ResourceCache,
    rate_limiter: RateLimiter,
    pool: Arc<ThreadPool>,
}

impl Dispatcher {
    /// Build a dispatcher fronting `registry` with `config`'s tunables.
    #[must_use]
    pub fn new(registry: Arc<Registry>, config: DispatcherConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            cache: ResourceCache::new(config.cache_capacity, mcp_cache::DEFAULT_STRIPES, config.cache_default_ttl),
            rate_limiter: RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window),
            pool: ThreadPool::new(config.worker_count, config.queue_capacity),
        })
    }

    /// Pool stats, for observability.
    #[must_use]
    pub fn pool_stats(&self) -> &crate::thread_pool::PoolStats {
        self.pool.stats()
    }

    /// Submit one message body to the worker pool and await its response.
    ///
    /// Returns `None` for notifications (no response expected) and for
    /// requests the pool silently drops (allocation failure building the
    /// response — the client sees a timeout instead, per the spec's
    /// best-effort failure policy). Returns `Some(bytes)` for every other
    /// case, including the synchronous `-32000 Server busy` response
    /// produced on the calling thread when the queue is full.
    pub async fn dispatch(self: &Arc<Self>, bytes: Vec<u8>, client_key: String) -> Option<Vec<u8>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let this = Arc::clone(self);
        let submitted = self.pool.submit(async move {
            let result = this.process(&bytes, &client_key).await;
            let _ = tx.send(result);
        });
        match submitted {
            Ok(()) => rx.await.unwrap_or(None),
            Err(PoolError::Busy) => {
                let id = sniff_id(&bytes);
                Some(encode(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(APPLICATION_ERROR, "Server busy"),
                )))
            }
        }
    }

    async fn process(&self, bytes: &[u8], client_key: &str) -> Option<Vec<u8>> {
        if !self.rate_limiter.admit(client_key) {
            warn!(client_key, "rate limit exceeded");
            let id = sniff_id(bytes);
            return Some(encode(JsonRpcResponse::error(
                id,
                JsonRpcError::new(APPLICATION_ERROR, "Rate limit exceeded"),
            )));
        }

        let incoming = with_worker_arena(|_arena| parse_incoming(bytes));
        let request = match incoming {
            Ok(IncomingMessage::Request(req)) => req,
            Ok(IncomingMessage::Notification(note)) => {
                debug!(method = %note.method, "dropping notification: no handlers registered for it");
                return None;
            }
            Err(err) => {
                let id = sniff_id(bytes);
                return Some(encode(JsonRpcResponse::error(id, err.into())));
            }
        };

        let outcome = self.route(&request.method, request.params).await;
        Some(match outcome {
            Ok(result) => encode(JsonRpcResponse::success(request.id, result)),
            Err(err) => encode(JsonRpcResponse::error(request.id, err.into())),
        })
    }

    async fn route(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match method {
            methods::LIST_RESOURCES => {
                self.require_resources(method)?;
                let result = ListResourcesResult {
                    resources: self.registry.resources().to_vec(),
                };
                Ok(serde_json::to_value(result).expect("ListResourcesResult always serializes"))
            }
            methods::LIST_RESOURCE_TEMPLATES => {
                self.require_resources(method)?;
                let result = ListResourceTemplatesResult {
                    resource_templates: self.registry.resource_templates().into_iter().cloned().collect(),
                };
                Ok(serde_json::to_value(result).expect("ListResourceTemplatesResult always serializes"))
            }
            methods::READ_RESOURCE => {
                self.require_resources(method)?;
                let uri = params
                    .as_ref()
                    .and_then(|p| p.get("uri"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing 'uri'"))?;
                let contents = self.read_resource_cached(uri).await?;
                let result = ReadResourceResult { contents };
                Ok(serde_json::to_value(result).expect("ReadResourceResult always serializes"))
            }
            methods::LIST_TOOLS => {
                self.require_tools(method)?;
                let result = ListToolsResult {
                    tools: self.registry.tools().iter().map(ToolListing::from).collect(),
                };
                Ok(serde_json::to_value(result).expect("ListToolsResult always serializes"))
            }
            methods::CALL_TOOL => {
                self.require_tools(method)?;
                let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("missing 'name'"))?;
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                let (content, is_error) = self.registry.call_tool(name, arguments).await?;
                let result = if is_error { CallToolResult::error(content) } else { CallToolResult::ok(content) };
                Ok(serde_json::to_value(result).expect("CallToolResult always serializes"))
            }
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn read_resource_cached(&self, uri: &str) -> McpResult<Vec<mcp_protocol::ContentItem>> {
        if let Some(cached) = self.cache.get(uri) {
            return Ok(cached);
        }
        let fresh = self.registry.read_resource(uri).await?;
        self.cache.put(uri, fresh.clone(), Ttl::Default);
        Ok(fresh)
    }

    fn require_resources(&self, method: &str) -> McpResult<()> {
        if self.registry.capabilities().resources {
            Ok(())
        } else {
            Err(McpError::method_not_found(method))
        }
    }

    fn require_tools(&self, method: &str) -> McpResult<()> {
        if self.registry.capabilities().tools {
            Ok(())
        } else {
            Err(McpError::method_not_found(method))
        }
    }
}

fn encode(response: JsonRpcResponse) -> Vec<u8> {
    serde_json::to_vec(&response).expect("JsonRpcResponse always serializes")
}

/// Best-effort extraction of a request's `id` for error responses produced
/// before (or instead of) a full parse, e.g. the busy/rate-limit paths.
/// Falls back to `0` ("no id") on anything that doesn't parse.
fn sniff_id(bytes: &[u8]) -> RequestId {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_u64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HandlerFuture, ResourceHandler, ToolHandler};
    use mcp_protocol::{ContentItem, ParamSchema, ParamType, Resource, Tool};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTool;
    impl ToolHandler for EchoTool {
        fn call(&self, arguments: Value) -> HandlerFuture<(Vec<ContentItem>, bool)> {
            Box::pin(async move {
                let text = arguments.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
                Ok((vec![ContentItem::text(text)], false))
            })
        }
    }

    struct CountingResourceHandler(Arc<AtomicUsize>);
    impl ResourceHandler for CountingResourceHandler {
        fn read(&self, _uri: &str) -> HandlerFuture<Vec<ContentItem>> {
            let calls = Arc::clone(&self.0);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![ContentItem::text("v1")])
            })
        }
    }

    fn make_dispatcher(calls: Arc<AtomicUsize>) -> Arc<Dispatcher> {
        let registry = Registry::builder()
            .resource(Resource::new("x://a"))
            .resource_handler(Arc::new(CountingResourceHandler(calls)))
            .tool(
                Tool::new("echo").with_param(ParamSchema::required("text", ParamType::String)),
                Arc::new(EchoTool),
            )
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(registry), DispatcherConfig::default())
    }

    #[tokio::test]
    async fn call_tool_round_trips() {
        let dispatcher = make_dispatcher(Arc::new(AtomicUsize::new(0)));
        let body = br#"{"jsonrpc":"2.0","id":1,"method":"call_tool","params":{"name":"echo","arguments":{"text":"hi"}}}"#;
        let response = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["content"][0]["text"], "hi");
        assert_eq!(value["result"]["isError"], false);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let dispatcher = make_dispatcher(Arc::new(AtomicUsize::new(0)));
        let body = br#"{"jsonrpc":"2.0","id":2,"method":"nope"}"#;
        let response = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn read_resource_hits_cache_on_second_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = make_dispatcher(Arc::clone(&calls));
        let body = br#"{"jsonrpc":"2.0","id":3,"method":"read_resource","params":{"uri":"x://a"}}"#;
        let first = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.unwrap();
        let second = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let dispatcher = make_dispatcher(Arc::new(AtomicUsize::new(0)));
        let body = br#"{"jsonrpc":"2.0","method":"ping"}"#;
        assert!(dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn rate_limit_exceeded_short_circuits_before_routing() {
        let registry = Registry::builder().build().unwrap();
        let mut config = DispatcherConfig::default();
        config.rate_limit_max_requests = 1;
        let dispatcher = Dispatcher::new(Arc::new(registry), config);
        let body = br#"{"jsonrpc":"2.0","id":9,"method":"list_tools"}"#;
        let _ = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await;
        let response = dispatcher.dispatch(body.to_vec(), "peer".to_string()).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["error"]["code"], -32000);
        assert_eq!(value["error"]["message"], "Rate limit exceeded");
    }
}
