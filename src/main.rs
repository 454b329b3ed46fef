//
// main.rs
// seriesnav
//
// Tokio entry point that hands off execution to the CLI layer so commands are resolved asynchronously.
//

use seriesnav::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}
