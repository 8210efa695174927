use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use nyboard_cli::commands::{DEFAULT_RECENT, DEFAULT_TOP};
use nyboard_cli::local::default_state_path;
use nyboard_cli::{ApiClient, App, ClientError};
use nyboard_types::api::EntryOrder;

#[derive(Parser)]
#[command(name = "nyboard-cli", version, about = "Claim your spot on the New Year board")]
struct Cli {
    /// Board server base URL
    #[arg(long, env = "NYBOARD_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Where this client remembers its submission
    #[arg(long, env = "NYBOARD_STATE")]
    state: Option<PathBuf>,

    /// Per-request timeout
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a name and get a rank
    Submit { name: String },
    /// Show the leaderboard
    Top {
        #[arg(long, default_value_t = DEFAULT_TOP)]
        limit: u32,
        #[arg(long, value_enum, default_value_t = Order::Rank)]
        order: Order,
    },
    /// Post a message (after submitting)
    Post { message: String },
    /// Show recent messages
    Messages {
        #[arg(long, default_value_t = DEFAULT_RECENT)]
        limit: u32,
    },
    /// Show what this client has submitted
    Whoami,
    /// Follow the board live
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    Rank,
    Created,
}

impl From<Order> for EntryOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Rank => EntryOrder::Rank,
            Order::Created => EntryOrder::Created,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Dropping the command on Ctrl-C releases its request guard.
    let outcome = tokio::select! {
        outcome = run(&cli) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
            return ExitCode::from(130);
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&cli.command, &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), ClientError> {
    let client = ApiClient::new(&cli.server, Duration::from_millis(cli.timeout_ms))?;
    let app = App::new(client, cli.state.clone().unwrap_or_else(default_state_path));

    let out = match &cli.command {
        Command::Submit { name } => app.submit(name).await?,
        Command::Top { limit, order } => app.top(*limit, (*order).into()).await?,
        Command::Post { message } => app.post(message).await?,
        Command::Messages { limit } => app.messages(*limit).await?,
        Command::Whoami => app.whoami().await?,
        Command::Watch => {
            app.watch(&mut std::io::stdout()).await?;
            return Ok(());
        }
    };

    print!("{out}");
    Ok(())
}

fn report(command: &Command, err: &ClientError) {
    // Anything that went wrong past local validation gets the same headline.
    match command {
        Command::Submit { .. } if err.is_request_failure() => eprintln!("submit failed"),
        Command::Post { .. } if err.is_request_failure() => eprintln!("post failed"),
        _ => {}
    }
    eprintln!("  {err}");
    if err.is_retryable() {
        eprintln!("  (you can try again)");
    }
}
