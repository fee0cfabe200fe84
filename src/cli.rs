use std::path::PathBuf;

use clap::Parser;

use crate::manager::OversellPolicy;

/// Matches BUY and SELL orders into per-share tax lots, first in first out.
///
/// Reads an order CSV (`Trade Action,Symbol,Trade Date,Price,Qty`) and writes one row per lot.
#[derive(Debug, Parser)]
pub struct TaxLotOpts {
    /// Order feed to read. Defaults to stdin.
    #[clap(long, short, env = "TAXLOT_INPUT")]
    pub input: Option<PathBuf>,

    /// Where to write the lot report. Defaults to stdout.
    #[clap(long, short, env = "TAXLOT_OUTPUT")]
    pub output: Option<PathBuf>,

    /// What to do when a sell exceeds the open units of an asset.
    #[clap(long, value_enum, default_value_t = OversellPolicy::Truncate, env = "TAXLOT_OVERSELL")]
    pub oversell: OversellPolicy,

    /// Log filter, e.g. `info` or `fifo_lots=debug`. Falls back to `RUST_LOG`, then `warn`.
    #[clap(long)]
    pub log_level: Option<String>,
}
