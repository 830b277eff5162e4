//! Minimal HTTP service for browsing a flame graph.
//!
//! ```text
//! GET /                 HTML page (d3-flame-graph)
//! GET /flamegraph.json  the aggregated tree
//! ```
//!
//! Every connection is served by its own task and closed after one
//! response.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>rdb flame graph</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/d3-flame-graph@4.1.3/dist/d3-flamegraph.css">
</head>
<body>
<div id="chart"></div>
<script src="https://d3js.org/d3.v7.js"></script>
<script src="https://cdn.jsdelivr.net/npm/d3-flame-graph@4.1.3/dist/d3-flamegraph.min.js"></script>
<script>
var chart = flamegraph().width(1200).cellHeight(18).minFrameSize(2);
fetch("/flamegraph.json")
  .then(function (resp) { return resp.json(); })
  .then(function (data) { d3.select("#chart").datum(data).call(chart); });
</script>
</body>
</html>
"##;

/// Request line longer than this is rejected.
const MAX_REQUEST_LINE: usize = 8 * 1024;

struct Response {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

fn route(request_line: &str, json: &str) -> Response {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let path = target.split('?').next().unwrap_or("");
    if method != "GET" {
        return Response::text("405 Method Not Allowed", "method not allowed\n");
    }
    match path {
        "/" | "/index.html" => Response {
            status: "200 OK",
            content_type: "text/html; charset=utf-8",
            body: INDEX_HTML.as_bytes().to_vec(),
        },
        "/flamegraph.json" => Response {
            status: "200 OK",
            content_type: "application/json",
            body: json.as_bytes().to_vec(),
        },
        _ => Response::text("404 Not Found", "not found\n"),
    }
}

/// Serves a rendered flame graph over HTTP.
pub struct FlameServer {
    listener: TcpListener,
}

impl FlameServer {
    /// Binds on all interfaces. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding port {}", port))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("reading bound address")
    }

    /// Accepts connections until an accept error occurs.
    pub async fn serve(self, json: String) -> Result<()> {
        let json: Arc<str> = Arc::from(json);
        info!(addr = %self.local_addr()?, "flame graph service listening");
        loop {
            let (stream, addr) = self.listener.accept().await.context("accepting connection")?;
            debug!(%addr, "connection");
            let json = Arc::clone(&json);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &json).await {
                    warn!(%addr, error = %e, "connection failed");
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, json: &str) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut request_line = String::new();
    let n = (&mut reader)
        .take(MAX_REQUEST_LINE as u64)
        .read_line(&mut request_line)
        .await
        .context("reading request line")?;
    if n == 0 {
        return Ok(());
    }
    // Drain headers up to the blank line.
    loop {
        let mut header = String::new();
        let n = (&mut reader)
            .take(MAX_REQUEST_LINE as u64)
            .read_line(&mut header)
            .await
            .context("reading headers")?;
        if n == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }
    let response = route(request_line.trim_end(), json);
    debug!(request = request_line.trim_end(), status = response.status, "request");
    write_half
        .write_all(&response.to_bytes())
        .await
        .context("writing response")?;
    write_half.shutdown().await.context("closing connection")?;
    Ok(())
}
