use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Snapshot store CLI for the micro-gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire the current snapshot (increments its refcount)
    Current,
    /// Release one reference to a snapshot
    Release {
        /// 5-digit snapshot id, e.g. 00042
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Current => client.get(format!("{}/current", base)).send().await?,
        Commands::Release { id } => client.get(format!("{}/release?id={}", base, id)).send().await?,
    };
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;

    if status.is_success() {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        eprintln!("Error ({}): {}", status, body);
    }
    Ok(())
}
