use clap::{CommandFactory, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "autoplan", version, about = "Automatic task scheduling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a snapshot of tasks, goals and events
    Plan(commands::plan::PlanArgs),
    /// Report goal pace for a snapshot
    Goals(commands::goals::GoalsArgs),
    /// Preference management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Energy curve
    Energy {
        #[command(subcommand)]
        action: commands::energy::EnergyAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan(args) => commands::plan::run(args).await,
        Commands::Goals(args) => commands::goals::run(args).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Energy { action } => commands::energy::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "autoplan", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
