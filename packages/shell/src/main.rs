use clap::Parser;
use mosaic_shell::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match mosaic_shell::log_filter(cli.verbose) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout();
    if let Err(e) = mosaic_shell::execute(cli, &mut stdout).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
