#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint for the `s3s` synchronizer.

use std::process;

/// Parses arguments, runs the requested command and exits with its status.
#[tokio::main]
async fn main() {
    let exit_code = s3s_app::run().await;
    if exit_code != 0 {
        process::exit(exit_code);
    }
}
