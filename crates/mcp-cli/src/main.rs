//! Interactive command-line client for exercising an MCP server over any
//! supported transport.
//!
//! Exit codes: `0` on a clean `exit` command or EOF on stdin, `1` if the
//! requested transport fails to connect or the arguments are invalid.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use mcp_client::Correlator;
use mcp_core::DEFAULT_TIMEOUT_MS;
use mcp_transport::http::HttpClientTransport;
use mcp_transport::stdio::StdioTransport;
use mcp_transport::streamable_http_client::{SseConfig, StreamableHttpClient};
use mcp_transport::tcp::TcpTransport;
use mcp_transport::websocket::WebSocketTransport;
use mcp_transport_traits::Transport;
use mcp_uri_template::Template;

/// Interactive command-line client for an MCP server.
#[derive(Parser, Debug)]
#[command(name = "mcp-cli", about = "Interactive command-line client for an MCP server")]
struct Args {
    /// Connect over stdio (spawns no subprocess; talks to this process's own stdin/stdout).
    #[arg(long)]
    stdio: bool,
    /// Connect over length-prefixed TCP to `--host:--port`.
    #[arg(long)]
    tcp: bool,
    /// Connect over plain request/response HTTP to `http://--host:--port`.
    #[arg(long)]
    http: bool,
    /// Connect over Streamable HTTP (POST + resumable SSE) to `http://--host:--port`.
    #[arg(long)]
    sthttp: bool,
    /// Connect over WebSocket to `ws://--host:--port--ws-path`.
    #[arg(long)]
    websocket: bool,
    /// Connect over MQTT request/response topics at `--host:--port`.
    #[cfg(feature = "mqtt")]
    #[arg(long)]
    mqtt: bool,

    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Server port.
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// WebSocket path.
    #[arg(long = "ws-path", default_value = "/ws")]
    ws_path: String,
    /// Bearer API key sent with HTTP-family transports.
    #[arg(long)]
    api_key: Option<String>,
    /// Per-request timeout, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout: u64,
    /// Accepted for compatibility; Streamable HTTP session tracking follows
    /// the server's `mcp-session-id` header automatically.
    #[arg(long)]
    enable_sessions: bool,
    /// Open the resumable SSE stream after connecting (Streamable HTTP only).
    #[arg(long)]
    enable_sse: bool,
    /// Let the SSE stream reconnect indefinitely instead of giving up after
    /// one dropped connection (Streamable HTTP only).
    #[arg(long)]
    enable_auto_reconnect: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "mcp-cli exiting");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let timeout = Duration::from_millis(args.timeout);
    let transport = build_transport(&args).await?;

    let correlator = Correlator::spawn(
        transport,
        Box::new(|method, params| {
            info!(method, ?params, "notification from server");
        }),
    );

    println!("connected. type 'help' for commands, 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }
        if let Err(err) = handle_command(&correlator, line, timeout).await {
            println!("error: {err:#}");
        }
    }
    Ok(())
}

async fn build_transport(args: &Args) -> anyhow::Result<Arc<dyn Transport>> {
    if args.tcp {
        let addr = format!("{}:{}", args.host, args.port).parse()?;
        let transport = TcpTransport::connect_to(addr).await?;
        return Ok(Arc::new(transport));
    }
    if args.http {
        return Ok(Arc::new(HttpClientTransport::new(
            format!("http://{}:{}", args.host, args.port),
            args.api_key.clone(),
        )));
    }
    if args.sthttp {
        let sse_config = SseConfig {
            max_reconnect_attempts: if args.enable_auto_reconnect { 0 } else { 1 },
            ..SseConfig::default()
        };
        let client = Arc::new(StreamableHttpClient::new(
            format!("http://{}:{}", args.host, args.port),
            args.api_key.clone(),
            sse_config,
        ));
        if args.enable_sse {
            client.start_sse();
        }
        return Ok(client as Arc<dyn Transport>);
    }
    if args.websocket {
        let url = format!("ws://{}:{}{}", args.host, args.port, args.ws_path);
        let transport = WebSocketTransport::connect_url(url).await?;
        return Ok(Arc::new(transport));
    }
    #[cfg(feature = "mqtt")]
    if args.mqtt {
        let transport = mcp_transport::mqtt::MqttTransport::connect(
            "mcp-cli",
            &args.host,
            args.port,
            "mcp",
        )
        .await?;
        return Ok(Arc::new(transport));
    }
    // Default, and explicit `--stdio`.
    Ok(Arc::new(StdioTransport::new()))
}

async fn handle_command(correlator: &Correlator, line: &str, timeout: Duration) -> anyhow::Result<()> {
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "help" => {
            println!(
                "commands:\n  list_resources\n  list_resource_templates\n  list_tools\n  read <uri>\n  expand <template> <json>\n  read_template <template> <json>\n  call <tool> <json>\n  help\n  exit"
            );
        }
        "list_resources" => print_response(correlator.send_request("list_resources", None, timeout).await?),
        "list_resource_templates" => {
            print_response(correlator.send_request("list_resource_templates", None, timeout).await?);
        }
        "list_tools" => print_response(correlator.send_request("list_tools", None, timeout).await?),
        "read" => {
            if rest.is_empty() {
                anyhow::bail!("usage: read <uri>");
            }
            let params = serde_json::json!({ "uri": rest });
            print_response(correlator.send_request("read_resource", Some(params), timeout).await?);
        }
        "expand" => {
            let (template, json) = rest.split_once(char::is_whitespace).ok_or_else(|| anyhow::anyhow!("usage: expand <template> <json>"))?;
            let uri = expand_template(template, json)?;
            println!("{uri}");
        }
        "read_template" => {
            let (template, json) = rest.split_once(char::is_whitespace).ok_or_else(|| anyhow::anyhow!("usage: read_template <template> <json>"))?;
            let uri = expand_template(template, json)?;
            let params = serde_json::json!({ "uri": uri });
            print_response(correlator.send_request("read_resource", Some(params), timeout).await?);
        }
        "call" => {
            let (tool, json) = rest.split_once(char::is_whitespace).unwrap_or((rest, "{}"));
            if tool.is_empty() {
                anyhow::bail!("usage: call <tool> <json>");
            }
            let arguments: Value = serde_json::from_str(json.trim())?;
            let params = serde_json::json!({ "name": tool, "arguments": arguments });
            print_response(correlator.send_request("call_tool", Some(params), timeout).await?);
        }
        other => println!("unknown command: {other} (type 'help')"),
    }
    Ok(())
}

fn expand_template(template: &str, json: &str) -> anyhow::Result<String> {
    let compiled = Template::parse(template)?;
    let params: Map<String, Value> = serde_json::from_str(json.trim())?;
    Ok(compiled.expand(&params)?)
}

fn print_response(value: Value) {
    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()));
}
