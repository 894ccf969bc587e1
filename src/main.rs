use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use context_atlas::api::{self, AppState};
use context_atlas::config::{default_intent_weights, Config};
use context_atlas::domain::extraction::NoopExtractionService;
use context_atlas::graph::GraphStore;
use context_atlas::ledger::RedisLedger;
use context_atlas::worker::{
    ConsolidationConsumer, ConsumerRunner, EnrichmentConsumer, ExtractionConsumer,
    ProjectionConsumer, StopSignal,
};

#[derive(Parser)]
#[command(
    name = "context-atlas",
    about = "Traceability-first context graph server for AI agents",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value = "8080", env = "CG_PORT")]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "CG_BIND_ADDRESS")]
    bind: String,

    /// Run the API without the pipeline consumers
    #[arg(long, env = "CG_API_ONLY")]
    api_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let ledger = RedisLedger::connect(config.redis.clone()).await?;
    ledger.ensure_index().await?;

    let graph = GraphStore::connect(config.neo4j.clone()).await?;
    graph.ensure_constraints().await?;

    let stop = StopSignal::new();

    if !cli.api_only {
        spawn_consumers(&ledger, &graph, &config, &stop);
    }

    let state = Arc::new(AppState {
        ledger,
        graph,
        config: config.clone(),
        intent_weights: default_intent_weights(),
    });

    let app = api::router(state);
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    tracing::info!(address = %addr, "starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_stop = stop.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown_stop.stop();
        })
        .await?;

    stop.stop();
    Ok(())
}

fn spawn_consumers(ledger: &RedisLedger, graph: &GraphStore, config: &Config, stop: &StopSignal) {
    let runner = |stop: StopSignal| {
        ConsumerRunner::new(
            ledger.connection(),
            config.redis.global_stream.clone(),
            config.worker.batch_size,
            config.redis.block_timeout_ms,
            stop,
        )
    };

    let projection = ProjectionConsumer::new(ledger.clone(), graph.clone(), config);
    let projection_runner = runner(stop.clone());
    tokio::spawn(async move {
        if let Err(err) = projection_runner.run(projection).await {
            tracing::error!(error = %err, "projection consumer exited");
        }
    });

    let enrichment = EnrichmentConsumer::new(ledger.clone(), graph.clone(), config);
    let enrichment_runner = runner(stop.clone());
    tokio::spawn(async move {
        if let Err(err) = enrichment_runner.run(enrichment).await {
            tracing::error!(error = %err, "enrichment consumer exited");
        }
    });

    let extraction = ExtractionConsumer::new(
        ledger.clone(),
        graph.clone(),
        Arc::new(NoopExtractionService),
        config,
    );
    let extraction_runner = runner(stop.clone());
    tokio::spawn(async move {
        if let Err(err) = extraction_runner.run(extraction).await {
            tracing::error!(error = %err, "extraction consumer exited");
        }
    });

    let consolidation = ConsolidationConsumer::new(ledger.clone(), graph.clone(), config.clone());
    let consolidation_runner = runner(stop.clone());
    tokio::spawn(async move {
        if let Err(err) = consolidation_runner.run(consolidation).await {
            tracing::error!(error = %err, "consolidation consumer exited");
        }
    });
}
