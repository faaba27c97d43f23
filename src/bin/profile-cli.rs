use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use webid_server::auth::{sign_request, AUTH_HEADER, TIMESTAMP_HEADER};

#[derive(Parser)]
#[command(name = "profile-cli")]
#[command(about = "Read and manage a WebID profile server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "WEBID_URL")]
    url: String,

    /// Bearer token for writes.
    #[arg(short, long, env = "WEBID_TOKEN", conflicts_with = "key_id")]
    token: Option<String>,

    /// Key id for signed writes (requires --secret-key).
    #[arg(long, requires = "secret_key")]
    key_id: Option<String>,

    /// Base64 Ed25519 secret key (32 byte seed).
    #[arg(long, env = "WEBID_SECRET_KEY")]
    secret_key: Option<String>,

    /// Send `If-Match` with this entity tag.
    #[arg(long)]
    if_match: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current profile
    Get,
    /// Replace the profile with a JSON-LD file
    Put { file: PathBuf },
    /// Delete the profile
    Delete,
    /// Generate a key pair for signed requests
    Keygen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match &cli.command {
        Commands::Get => {
            let res = client.get(format!("{}/profile", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Put { file } => {
            let body = std::fs::read(file)?;
            serde_json::from_slice::<Value>(&body)?;
            let res = send_write(&client, &cli, Method::PUT, body).await?;
            print_response(res).await?;
        }
        Commands::Delete => {
            let res = send_write(&client, &cli, Method::DELETE, Vec::new()).await?;
            print_response(res).await?;
        }
        Commands::Keygen => {
            let mut seed = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut seed);
            let key = SigningKey::from_bytes(&seed);
            println!("secret_key = \"{}\"", STANDARD.encode(key.to_bytes()));
            println!("public_key = \"{}\"", STANDARD.encode(key.verifying_key().to_bytes()));
        }
    }

    Ok(())
}

async fn send_write(
    client: &reqwest::Client,
    cli: &Cli,
    method: Method,
    body: Vec<u8>,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let path = "/profile";
    let mut headers = HeaderMap::new();
    if !body.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/ld+json"));
    }
    if let Some(tag) = &cli.if_match {
        headers.insert(reqwest::header::IF_MATCH, HeaderValue::from_str(tag)?);
    }

    match (&cli.token, &cli.key_id, &cli.secret_key) {
        (Some(token), _, _) => {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }
        (None, Some(key_id), Some(secret)) => {
            let seed: [u8; 32] = STANDARD
                .decode(secret.trim())?
                .try_into()
                .map_err(|_| "secret key must decode to 32 bytes")?;
            let key = SigningKey::from_bytes(&seed);
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_secs();
            let auth = sign_request(&key, key_id, method.as_str(), path, timestamp, &body);
            headers.insert(AUTH_HEADER, HeaderValue::from_str(&auth)?);
            headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&timestamp.to_string())?);
        }
        _ => return Err("writes need --token or --key-id with --secret-key".into()),
    }

    let res = client
        .request(method, format!("{}{}", cli.url, path))
        .headers(headers)
        .body(body)
        .send()
        .await?;
    Ok(res)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let etag = res
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if let Some(etag) = etag {
        eprintln!("ETag: {}", etag);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
    } else {
        let json: Value = serde_json::from_str(&text)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
