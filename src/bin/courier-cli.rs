use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "courier-cli")]
#[command(about = "Management CLI for a courier status server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Admin key, only needed for `reset`.
    #[arg(short, long, env = "COURIER_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Current process health
    Health,
    /// Service descriptor with latest health
    Info,
    /// Circuit breaker state per destination and operation
    Breakers,
    /// Health and breakers in one report
    Status,
    /// Registered services
    Services,
    /// Force one circuit breaker closed
    Reset { destination: String, operation: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.as_str();

    let res = match cli.command {
        Commands::Health => client.get(endpoint(base, &["health"])?).send().await?,
        Commands::Info => client.get(endpoint(base, &["info"])?).send().await?,
        Commands::Breakers => client.get(endpoint(base, &["circuit-breakers"])?).send().await?,
        Commands::Status => client.get(endpoint(base, &["status"])?).send().await?,
        Commands::Services => client.get(endpoint(base, &["services"])?).send().await?,
        Commands::Reset { destination, operation } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
            );
            let url = endpoint(base, &["circuit-breakers", &destination, &operation, "reset"])?;
            client.post(url).headers(headers).send().await?
        }
    };

    print_response(res).await
}

/// Append `segments` to `base`, percent-encoding each one.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("'{base}' cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: status server returned {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_encoded() {
        let url = endpoint(
            "http://localhost:8000",
            &["circuit-breakers", "user", "profile/get ?v2", "reset"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/circuit-breakers/user/profile%2Fget%20%3Fv2/reset"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let url = endpoint("http://gateway:8000/courier/", &["health"]).unwrap();
        assert_eq!(url.as_str(), "http://gateway:8000/courier/health");
    }

    #[test]
    fn test_rejects_non_hierarchical_base() {
        assert!(endpoint("mailto:ops@example.com", &["health"]).is_err());
        assert!(endpoint("not a url", &["health"]).is_err());
    }
}
