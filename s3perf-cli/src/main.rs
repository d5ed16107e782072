//! The `s3perf` command line tool.
//!
//! Reads a JSON event from a file or stdin, runs it against the configured reference and
//! accelerated endpoints, and prints the JSON response to stdout. See [`cli`] for the available
//! commands and [`config`] for configuration.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod cli;
mod config;
mod observability;

fn main() -> anyhow::Result<()> {
    cli::execute()
}
