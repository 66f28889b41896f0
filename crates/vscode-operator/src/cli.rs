use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser};

use crate::telemetry::TelemetryOptions;

pub const DEFAULT_HTTP_ADDRESS: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Print the merged Vscode CustomResourceDefinition as YAML.
    Crd,

    /// Serve the conversion webhook and the metrics endpoint.
    Run(RunArguments),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct RunArguments {
    /// Socket address the HTTP server listens on.
    #[arg(long, env, default_value_t = DEFAULT_HTTP_ADDRESS)]
    pub http_address: SocketAddr,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}
