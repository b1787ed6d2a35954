//! MCP server - line-oriented JSON-RPC 2.0 dispatcher
//!
//! Reads one JSON message per line, handles it to completion, writes at most
//! one response line, then reads the next. A bad or failing message never
//! ends the loop; only I/O failure on the stream does.

use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use ulid::Ulid;

use super::catalog::ToolCatalog;
use super::jsonrpc::{
    Incoming, JsonRpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR,
};
use super::tools::{parse_args, SearchTool, WriteTool};
use crate::config::{Config, ServerConfig};
use crate::knowledge::Knowledge;

/// Handshake progress. Advisory only: requests are served in either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// A JSON-RPC error produced while handling a request
#[derive(Debug)]
struct Fault {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl Fault {
    fn new(code: i64, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn internal(detail: String) -> Self {
        Self::new(INTERNAL_ERROR, format!("Internal error: {}", detail)).with_data(json!(detail))
    }

    fn into_response(self, id: Value) -> JsonRpcResponse {
        match self.data {
            Some(data) => JsonRpcResponse::error_with_data(id, self.code, self.message, data),
            None => JsonRpcResponse::error(id, self.code, self.message),
        }
    }
}

/// MCP server handler
pub struct McpServer {
    knowledge: Knowledge,
    catalog: ToolCatalog,
    info: ServerConfig,
    state: SessionState,
    /// Unique id of this connection, used in logs
    session_id: String,
}

impl McpServer {
    pub fn new(knowledge: Knowledge, catalog: ToolCatalog, info: ServerConfig) -> Self {
        Self {
            knowledge,
            catalog,
            info,
            state: SessionState::Uninitialized,
            session_id: format!("mcp-{}", Ulid::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Handle one raw line. Returns the response to write, if any.
    pub fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        tracing::debug!(received = %truncate(line, 200), "message in");

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse message");
                return Some(JsonRpcResponse::error_with_data(
                    Value::Null,
                    PARSE_ERROR,
                    "Parse error".to_string(),
                    json!(e.to_string()),
                ));
            }
        };

        match Incoming::classify(message) {
            Ok(Incoming::Notification { method, .. }) => {
                self.handle_notification(&method);
                None
            }
            Ok(Incoming::Request { id, method, params }) => {
                Some(self.handle_request(id, &method, &params))
            }
            Err(response) => {
                tracing::warn!("invalid request shape");
                Some(response)
            }
        }
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" => {
                self.state = SessionState::Ready;
                tracing::info!("client initialized");
            }
            "notifications/cancelled" => tracing::debug!("client cancelled a request"),
            other => tracing::debug!(method = other, "notification ignored"),
        }
    }

    /// Always produces exactly one response, including when a handler panics
    fn handle_request(&mut self, id: Value, method: &str, params: &Value) -> JsonRpcResponse {
        if self.state == SessionState::Uninitialized && method != "initialize" {
            tracing::debug!(method, "request before handshake completed");
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(method, params)))
            .unwrap_or_else(|payload| {
                let detail = panic_message(payload.as_ref());
                tracing::error!(method, detail = %detail, "handler panicked");
                Err(Fault::internal(detail))
            });

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(fault) => {
                tracing::warn!(method, code = fault.code, message = %fault.message, "request failed");
                fault.into_response(id)
            }
        }
    }

    fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, Fault> {
        match method {
            "initialize" => Ok(self.handle_initialize()),
            "tools/list" => Ok(self.handle_list_tools()),
            "tools/call" => self.handle_call_tool(params),
            "ping" => Ok(json!({})),
            _ => Err(
                Fault::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
                    .with_data(json!({ "method": method })),
            ),
        }
    }

    fn handle_initialize(&self) -> Value {
        tracing::info!("handshake");
        json!({
            "protocolVersion": self.info.protocol_version,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": self.info.name,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Semantic knowledge store. Use `search` to find knowledge by meaning, `ingest` to add a new document under a unique service_name, and `update` to replace (or create) the document for a service_name."
        })
    }

    fn handle_list_tools(&self) -> Value {
        let tools = self.catalog.list();
        tracing::info!(count = tools.len(), catalog = %self.catalog.version(), "listing tools");
        json!({ "tools": tools })
    }

    fn handle_call_tool(&self, params: &Value) -> Result<Value, Fault> {
        // A missing or non-string name is just another unknown tool
        let name = params.get("name").and_then(Value::as_str);
        let arguments = params.get("arguments").unwrap_or(&Value::Null);

        tracing::info!(tool = ?name, "tool call");

        let text = match name {
            Some("ingest") => self.do_ingest(arguments),
            Some("update") => self.do_update(arguments),
            Some("search") => self.do_search(arguments),
            other => {
                return Err(Fault::new(
                    METHOD_NOT_FOUND,
                    format!("Tool not found: {}", other.unwrap_or("<none>")),
                )
                .with_data(json!({ "tool": other })))
            }
        }
        .map_err(|e| Fault::internal(format!("{:#}", e)))?;

        Ok(json!({
            "content": [{
                "type": "text",
                "text": text
            }]
        }))
    }

    fn do_ingest(&self, arguments: &Value) -> Result<String> {
        let args: WriteTool = parse_args("ingest", arguments)?;
        let outcome = self.knowledge.ingest.ingest(
            &args.service_name,
            &args.content,
            args.metadata.as_ref(),
        )?;
        Ok(serde_json::to_string_pretty(&outcome)?)
    }

    fn do_update(&self, arguments: &Value) -> Result<String> {
        let args: WriteTool = parse_args("update", arguments)?;
        let outcome = self.knowledge.update.update(
            &args.service_name,
            &args.content,
            args.metadata.as_ref(),
        )?;
        Ok(serde_json::to_string_pretty(&outcome)?)
    }

    fn do_search(&self, arguments: &Value) -> Result<String> {
        let args: SearchTool = parse_args("search", arguments)?;
        let outcome = self.knowledge.search.search(&args.query, &args.options())?;
        Ok(serde_json::to_string_pretty(&outcome)?)
    }

    /// Serve until the reader reaches EOF.
    ///
    /// Lines that are not valid UTF-8 get a parse error like any other bad line.
    pub fn serve<R: BufRead, W: Write>(&mut self, mut reader: R, mut writer: W) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .context("Failed to read from client")?;
            if read == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line),
                Err(e) => Some(JsonRpcResponse::error_with_data(
                    Value::Null,
                    PARSE_ERROR,
                    "Parse error".to_string(),
                    json!(e.to_string()),
                )),
            };

            if let Some(response) = response {
                let json = serde_json::to_string(&response)?;
                tracing::debug!(sent = %truncate(&json, 200), "message out");
                writeln!(writer, "{}", json).context("Failed to write response")?;
                writer.flush().context("Failed to flush response")?;
            }
        }

        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Build the server from config
pub fn build_server(config: &Config) -> Result<McpServer> {
    let knowledge = Knowledge::from_config(config)?;

    let catalog = match &config.tools.schema_dir {
        Some(dir) => ToolCatalog::from_dir(dir),
        None => ToolCatalog::bundled(),
    };

    Ok(McpServer::new(knowledge, catalog, config.server.clone()))
}

/// Run the MCP server with STDIO transport
pub fn run_mcp_server(config: &Config) -> Result<()> {
    let mut server = build_server(config)?;

    let span = tracing::info_span!("mcp", session = %server.session_id());
    let _enter = span.enter();
    tracing::info!(database = %config.database_path().display(), "MCP server starting");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    server.serve(stdin.lock(), stdout.lock())?;

    tracing::info!("MCP server stopping");
    Ok(())
}
