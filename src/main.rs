//! srisync binary entry point.

use std::process;

#[tokio::main]
async fn main() {
    if let Err(err) = srisync::cli::run().await {
        srisync::ui::output::error(format!("{err:#}"));
        process::exit(1);
    }
}
