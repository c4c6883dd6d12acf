use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the gateway resilience service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Admin API key. Falls back to GATEWAY_ADMIN_API_KEY.
    #[arg(short, long, env = "GATEWAY_ADMIN_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall service status
    Status,
    /// List every circuit with its statistics
    Circuits,
    /// Show one circuit, including its transition history
    Circuit { name: String },
    /// Force a circuit back to Closed
    Reset { name: String },
    /// Webhook validation counters and settings
    Webhook,
    /// Error classification totals
    Errors,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Circuits => client.get(format!("{}/admin/circuits", base)),
        Commands::Circuit { name } => client.get(format!("{}/admin/circuits/{}", base, name)),
        Commands::Reset { name } => client.post(format!("{}/admin/circuits/{}/reset", base, name)),
        Commands::Webhook => client.get(format!("{}/admin/webhook", base)),
        Commands::Errors => client.get(format!("{}/admin/errors", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
