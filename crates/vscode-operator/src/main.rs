//! Serves the Vscode conversion webhook and the Vscode controller metrics.
use std::{io::Write as _, net::SocketAddr, sync::Arc};

use clap::Parser as _;
use kube::core::crd::MergeError;
use prometheus::Registry;
use snafu::{ResultExt as _, Snafu};
use tokio::net::TcpListener;
use vscode_crd::{Vscode, VscodeVersion};
use vscode_metrics::{StatefulSetCache, VscodeMetrics};

use crate::{
    cli::{Command, Opts, RunArguments},
    telemetry::Tracing,
};

mod cli;
mod http;
mod telemetry;

const APP_NAME: &str = "vscode-operator";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitTracing { source: telemetry::Error },

    #[snafu(display("failed to merge the Vscode CRD versions"))]
    MergeCrd { source: MergeError },

    #[snafu(display("failed to serialize the Vscode CRD"))]
    SerializeCrd { source: serde_yaml::Error },

    #[snafu(display("failed to write the Vscode CRD to stdout"))]
    WriteCrd { source: std::io::Error },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to set up metrics"))]
    SetUpMetrics { source: vscode_metrics::Error },

    #[snafu(display("failed to bind HTTP server to {address}"))]
    BindHttpServer {
        source: std::io::Error,
        address: SocketAddr,
    },

    #[snafu(display("failed to run HTTP server"))]
    RunHttpServer { source: std::io::Error },
}

#[tokio::main]
#[snafu::report]
async fn main() -> Result<(), Error> {
    let opts = Opts::parse();

    match opts.command {
        Command::Crd => print_crd(),
        Command::Run(arguments) => {
            let _tracing =
                Tracing::init(APP_NAME, &arguments.telemetry).context(InitTracingSnafu)?;
            run(arguments).await
        }
    }
}

fn print_crd() -> Result<(), Error> {
    let crd = Vscode::merged_crd(VscodeVersion::HUB).context(MergeCrdSnafu)?;
    let yaml = serde_yaml::to_string(&crd).context(SerializeCrdSnafu)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(yaml.as_bytes()).context(WriteCrdSnafu)?;
    stdout.flush().context(WriteCrdSnafu)
}

async fn run(arguments: RunArguments) -> Result<(), Error> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        hub_version = %VscodeVersion::HUB,
        "starting {APP_NAME}"
    );

    let client = kube::Client::try_default()
        .await
        .context(CreateClientSnafu)?;

    let (cache, cache_driver) = StatefulSetCache::new(client);
    tokio::spawn(cache_driver);

    let registry = Registry::new();
    let metrics = VscodeMetrics::new(Arc::new(cache)).context(SetUpMetricsSnafu)?;
    metrics.register(&registry).context(SetUpMetricsSnafu)?;

    let address = arguments.http_address;
    let listener = TcpListener::bind(address)
        .await
        .context(BindHttpServerSnafu { address })?;

    tracing::info!(%address, "serving conversion webhook and metrics");
    axum::serve(listener, http::router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(RunHttpServerSnafu)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(error) => tracing::error!(
            error = &error as &dyn std::error::Error,
            "failed to listen for shutdown signal"
        ),
    }
}
