//! Command line interface for the `galileo` ingest binary.
//!
//! Also compiled by the build script to render the manual page, so it must
//! not depend on the library.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};

/// How archive batches are split into records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Boundary {
    /// Every record marker byte starts a record.
    #[default]
    MarkerScan,
    /// Only record markers in tag position start a record.
    TagWalk,
}

/// Command line arguments for the `galileo` binary.
#[derive(Debug, Parser)]
#[command(
    name = "galileo",
    version,
    about = "Accept Galileosky tracker connections and print decoded records as JSON lines"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:7777")]
    pub bind: SocketAddr,

    /// TOML file with extra tag definitions layered over the built-in table.
    #[arg(long, value_name = "FILE")]
    pub tags: Option<PathBuf>,

    /// Seconds a connection may stay silent before it is closed.
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub read_timeout: u64,

    /// Bytes a connection may buffer without completing a frame.
    #[arg(long, value_name = "BYTES", default_value_t = 65_536)]
    pub max_buffered_bytes: usize,

    /// Largest accepted frame body.
    #[arg(long, value_name = "BYTES", default_value_t = 32_767)]
    pub max_body_length: usize,

    /// Drop the connection on an impossible length field instead of
    /// resynchronising.
    #[arg(long)]
    pub strict_framing: bool,

    /// Archive batch splitting strategy.
    #[arg(long, value_enum, default_value_t = Boundary::MarkerScan)]
    pub boundary: Boundary,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
