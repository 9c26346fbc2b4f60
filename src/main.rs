use clap::Parser;
use notekeep::cli::commands::Cli;
use notekeep::cli::handlers::{self, Reported};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("NK_LOG").unwrap_or_else(|_| "notekeep=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        // Already shown by the notifier
        if !e.is::<Reported>() {
            eprintln!("error: {}", e);
        }
        std::process::exit(1);
    }
}
