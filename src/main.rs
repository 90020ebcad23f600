//! EdgeCache Node
//!
//! Runs a self-contained edge topology in one process: two cooperating
//! edge nodes over the loopback transport, one origin, and a synthetic
//! client workload.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        EdgeCache Topology                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   clients ──▶ ┌──────────┐ ◀── peer lookup ──▶ ┌──────────┐     │
//! │               │   cdn1   │                     │   cdn2   │     │
//! │               └──────────┘                     └──────────┘     │
//! │                     │          ┌──────────┐         │           │
//! │                     └─────────▶│  origin  │◀────────┘           │
//! │                                └──────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use edgecache::adapters::{LoggingEventSink, LoopbackNetwork};
use edgecache::config::NodeConfig;
use edgecache::domain::ports::{CorrelationId, NodeId};
use edgecache::error::{Error, Result};
use edgecache::message::{ReplyMessage, RequestMessage};
use edgecache::node::{EdgeNode, ResolutionPolicy};
use edgecache::origin::OriginServer;
use edgecache::metrics;

// =============================================================================
// CLI Arguments
// =============================================================================

/// EdgeCache - cooperative caching edge node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Identity of the first edge node
    #[arg(long, env = "NODE_ID", default_value = "cdn1.example.org")]
    node_id: String,

    /// Identity of the peer edge node
    #[arg(long, env = "PEER_ID", default_value = "cdn2.example.org")]
    peer_id: String,

    /// Identity of the origin server
    #[arg(long, env = "ORIGIN_ID", default_value = "origin.example.org")]
    origin_id: String,

    /// Cache capacity in entries, per node
    #[arg(long, env = "CACHE_CAPACITY", default_value = "30")]
    cache_capacity: usize,

    /// Lookup timeout in seconds
    #[arg(long, env = "LOOKUP_TIMEOUT_SECONDS", default_value = "10")]
    lookup_timeout_seconds: u64,

    /// Miss resolution policy (peer-then-origin, origin-only)
    #[arg(long, env = "RESOLUTION_POLICY", default_value = "peer-then-origin")]
    resolution_policy: String,

    /// Number of synthetic client requests to issue
    #[arg(long, env = "WORKLOAD_REQUESTS", default_value = "48")]
    workload_requests: usize,

    /// Number of distinct resources in the workload
    #[arg(long, env = "WORKLOAD_RESOURCES", default_value = "12")]
    workload_resources: usize,

    /// Keep serving metrics/health after the workload completes
    #[arg(long, env = "SERVE")]
    serve: bool,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting EdgeCache");
    info!("  Node: {}", args.node_id);
    info!("  Peer: {}", args.peer_id);
    info!("  Origin: {}", args.origin_id);
    info!("  Cache capacity: {} entries", args.cache_capacity);
    info!("  Lookup timeout: {}s", args.lookup_timeout_seconds);
    info!("  Resolution policy: {}", args.resolution_policy);

    let capacity = NonZeroUsize::new(args.cache_capacity)
        .ok_or_else(|| Error::Config("cache capacity must be a positive integer".into()))?;
    let policy: ResolutionPolicy = args.resolution_policy.parse()?;
    let lookup_timeout = Duration::from_secs(args.lookup_timeout_seconds);

    let network = Arc::new(LoopbackNetwork::new());
    let events = Arc::new(LoggingEventSink::debug_level());
    let cancel = CancellationToken::new();

    // Origin
    let origin = Arc::new(OriginServer::new(
        args.origin_id.as_str(),
        network.clone() as Arc<dyn edgecache::Transport>,
    ));
    let origin_inbox = network.register(origin.id().clone());
    tokio::spawn(origin.clone().run(origin_inbox, cancel.clone()));

    // Edge nodes: each one's peer is the other
    let cdn1 = spawn_edge_node(
        NodeConfig::new(
            args.node_id.as_str(),
            args.peer_id.as_str(),
            args.origin_id.as_str(),
        )
        .with_capacity(capacity)
        .with_lookup_timeout(lookup_timeout)
        .with_policy(policy),
        &network,
        events.clone(),
        &cancel,
    )?;
    let cdn2 = spawn_edge_node(
        NodeConfig::new(
            args.peer_id.as_str(),
            args.node_id.as_str(),
            args.origin_id.as_str(),
        )
        .with_capacity(capacity)
        .with_lookup_timeout(lookup_timeout)
        .with_policy(policy),
        &network,
        events,
        &cancel,
    )?;

    info!("Topology wired: {} ◀──▶ {} ──▶ {}", args.node_id, args.peer_id, args.origin_id);

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_nodes = vec![cdn1.clone(), cdn2.clone()];
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_nodes).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Drive the synthetic workload
    run_workload(&args, &network, &cdn1, &cdn2).await?;

    report_node(&cdn1);
    report_node(&cdn2);

    if args.serve {
        info!("Workload complete; serving metrics until Ctrl-C");
        tokio::signal::ctrl_c().await?;
    }

    cancel.cancel();
    info!("EdgeCache shutdown complete");
    Ok(())
}

fn spawn_edge_node(
    config: NodeConfig,
    network: &Arc<LoopbackNetwork>,
    events: Arc<LoggingEventSink>,
    cancel: &CancellationToken,
) -> Result<Arc<EdgeNode>> {
    let node = Arc::new(EdgeNode::new(config, network.clone(), events)?);
    let inbox = network.register(node.id().clone());
    tokio::spawn(node.clone().run(inbox, cancel.clone()));
    Ok(node)
}

// =============================================================================
// Workload
// =============================================================================

/// Name the i-th distinct workload resource, cycling the categories.
fn resource_name(i: usize) -> String {
    match i % 4 {
        0 => format!("/page{i}.html"),
        1 => format!("/notes{i}.txt"),
        2 => format!("/img{i}.png"),
        _ => format!("/blob{i}.dat"),
    }
}

/// Issue client requests alternately against both edge nodes and wait for
/// the replies.
async fn run_workload(
    args: &Args,
    network: &Arc<LoopbackNetwork>,
    cdn1: &Arc<EdgeNode>,
    cdn2: &Arc<EdgeNode>,
) -> Result<()> {
    if args.workload_requests == 0 {
        return Ok(());
    }

    let client = NodeId::new("client.example.org");
    let (conn1, replies1) = network.open_client_connection();
    let (conn2, replies2) = network.open_client_connection();

    info!(
        "Issuing {} requests over {} resources",
        args.workload_requests, args.workload_resources
    );
    for i in 0..args.workload_requests {
        let resource = resource_name(i % args.workload_resources.max(1));
        let (target, connection) = if i % 2 == 0 {
            (cdn1.id(), conn1)
        } else {
            (cdn2.id(), conn2)
        };
        let request = RequestMessage::get(&resource, client.clone())
            .with_correlation(CorrelationId(i as u64));
        network.submit_request(target, request, connection)?;
    }

    let received = collect_replies(
        args.workload_requests,
        replies1,
        replies2,
        Duration::from_secs(args.lookup_timeout_seconds + 5),
    )
    .await;

    if received < args.workload_requests {
        warn!(
            "Workload incomplete: {}/{} replies received",
            received, args.workload_requests
        );
    } else {
        info!("Workload complete: {} replies received", received);
    }
    Ok(())
}

async fn collect_replies(
    expected: usize,
    mut replies1: mpsc::UnboundedReceiver<ReplyMessage>,
    mut replies2: mpsc::UnboundedReceiver<ReplyMessage>,
    timeout: Duration,
) -> usize {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut received = 0;
    while received < expected {
        tokio::select! {
            _ = &mut deadline => break,
            reply = replies1.recv() => match reply {
                Some(reply) => {
                    debug!(status = %reply.status, correlation = %reply.correlation_id, "client reply");
                    received += 1;
                }
                None => break,
            },
            reply = replies2.recv() => match reply {
                Some(reply) => {
                    debug!(status = %reply.status, correlation = %reply.correlation_id, "client reply");
                    received += 1;
                }
                None => break,
            },
        }
    }
    received
}

fn report_node(node: &Arc<EdgeNode>) {
    let counters = node.counters_snapshot();
    let cache = node.cache_stats();
    info!(
        "{}: html={} text={} img={} bad={} | cache {}/{} entries, {} hits, {} misses, {} evictions",
        node.id(),
        counters.html_docs_served,
        counters.text_resources_served,
        counters.img_resources_served,
        counters.bad_requests,
        cache.entries,
        cache.capacity,
        cache.hits,
        cache.misses,
        cache.evictions,
    );
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("tower=warn".parse().expect("static directive"));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn health_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/healthz" | "/livez" | "/readyz" => Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("ok")))
                .unwrap(),
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid health server address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind health server: {e}")))?;

    info!("Health server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("health server accept error: {e}")))?;

        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(health_handler))
                .await
            {
                tracing::error!("Health server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, nodes: Vec<Arc<EdgeNode>>) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, TextEncoder};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn metrics_handler(
        req: Request<hyper::body::Incoming>,
        nodes: Vec<Arc<EdgeNode>>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/metrics" => {
                for node in &nodes {
                    metrics::publish(
                        node.id().as_str(),
                        &node.counters_snapshot(),
                        &node.cache_stats(),
                        node.pending_len(),
                    );
                }

                let encoder = TextEncoder::new();
                let metric_families = prometheus::gather();
                let mut buffer = Vec::new();
                encoder.encode(&metric_families, &mut buffer).unwrap();

                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", encoder.format_type())
                    .body(Full::new(Bytes::from(buffer)))
                    .unwrap()
            }
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid metrics server address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind metrics server: {e}")))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("metrics server accept error: {e}")))?;

        let io = TokioIo::new(stream);
        let nodes = nodes.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let nodes = nodes.clone();
                async move { metrics_handler(req, nodes).await }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
