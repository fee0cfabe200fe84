use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    process,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fifo_lots::{cli::TaxLotOpts, driver, error::TaxLotError, feed::OrderFeed};

fn main() {
    let opts = TaxLotOpts::parse();
    init_tracing(opts.log_level.as_deref());

    if let Err(e) = process_orders(&opts) {
        eprintln!("{e}");
        process::exit(1);
    }
}

/// Logs go to stderr so the report on stdout stays clean.
fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn process_orders(opts: &TaxLotOpts) -> Result<(), TaxLotError> {
    let mut sink: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match &opts.input {
        Some(path) => {
            let feed = OrderFeed::new(BufReader::new(File::open(path)?))?;
            driver::run(feed, &mut sink, opts.oversell)?;
        }
        None => {
            let feed = OrderFeed::new(io::stdin().lock())?;
            driver::run(feed, &mut sink, opts.oversell)?;
        }
    }

    Ok(())
}
