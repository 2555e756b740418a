use altscout::cli::{self, Cli, Commands};
use altscout::errors::AltscoutError;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(&cli.config, args, cli.quiet).await,
        Commands::Status(args) => cli::status::handle_status(&cli.config, args).await,
        Commands::Reset(args) => cli::reset::handle_reset(&cli.config, args).await,
        Commands::Validate => cli::validate::handle_validate(&cli.config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &AltscoutError) -> i32 {
    match error.root() {
        AltscoutError::Config(_) | AltscoutError::Yaml(_) => 2,
        AltscoutError::EmptyResult { .. } => 3,
        AltscoutError::Authentication(_) => 4,
        AltscoutError::Cancelled => 5,
        _ => 1,
    }
}
