use clap::Parser;
use lockbox::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli::run(cli).await {
        lockbox::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
