use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use facerelay_core::{normalize, BlobReceipt, RawAnnotation, Rectangle};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facerelay", about = "facerelay face detection and storage relay CLI")]
struct Cli {
    /// Base URL of the facerelayd server
    #[arg(long, env = "FACERELAY_URL", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    /// Print rectangles as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image file
    Detect {
        /// Image to send (any format the provider accepts)
        image: PathBuf,
    },
    /// Upload a file under an allowed object name
    Upload {
        /// Object name (e.g., "roster", "settings")
        name: String,
        file: PathBuf,
    },
    /// Download a stored object
    Download {
        name: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show server status
    Status,
    /// Normalize a JSON array of annotations locally, without a server
    Normalize {
        /// File containing `[{"vertices": [{"x": .., "y": ..}, ..]}, ..]`
        annotations: PathBuf,
    },
}

#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<Rectangle>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = cli.server.as_str();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Detect { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            tracing::debug!(path = %image.display(), size = bytes.len(), "sending image");

            let body = serde_json::json!({
                "image": base64::engine::general_purpose::STANDARD.encode(&bytes),
            });
            let response = client
                .post(endpoint(base, &["faces"])?)
                .json(&body)
                .send()
                .await
                .context("contacting facerelayd")?;
            let detected: DetectResponse = check(response).await?.json().await?;
            println!("{}", render_rectangles(&detected.faces, cli.json)?);
        }
        Commands::Upload { name, file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let response = client
                .put(endpoint(base, &["storage", name.as_str()])?)
                .body(data)
                .send()
                .await
                .context("contacting facerelayd")?;
            let receipt: BlobReceipt = check(response).await?.json().await?;
            println!(
                "Stored {name} as {} ({} bytes, sha256 {})",
                receipt.key, receipt.size, receipt.sha256
            );
        }
        Commands::Download { name, output } => {
            let response = client
                .get(endpoint(base, &["storage", name.as_str()])?)
                .send()
                .await
                .context("contacting facerelayd")?;
            let data = check(response).await?.bytes().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => std::io::stdout().write_all(&data)?,
            }
        }
        Commands::Status => {
            let response = client
                .get(endpoint(base, &["status"])?)
                .send()
                .await
                .with_context(|| format!("facerelayd not reachable at {base}"))?;
            let status: serde_json::Value = check(response).await?.json().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Normalize { annotations } => {
            let src = std::fs::read_to_string(&annotations)
                .with_context(|| format!("reading {}", annotations.display()))?;
            let parsed: Vec<RawAnnotation> =
                serde_json::from_str(&src).context("parsing annotations")?;
            println!("{}", render_rectangles(&normalize(&parsed), cli.json)?);
        }
    }

    Ok(())
}

/// Append path segments to the server URL, percent-encoding each one so a
/// segment can never introduce extra path components.
fn endpoint(base: &str, segments: &[&str]) -> Result<reqwest::Url> {
    let mut url =
        reqwest::Url::parse(base).with_context(|| format!("invalid server URL {base:?}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("server URL {base:?} cannot take a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Pass successful responses through; turn error responses into an `Err`
/// carrying the server's `error` message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    bail!("server returned {status}: {message}")
}

fn render_rectangles(faces: &[Rectangle], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(faces)?);
    }
    if faces.is_empty() {
        return Ok("No faces detected".to_string());
    }

    let mut out = format!("{} face(s):", faces.len());
    for (i, r) in faces.iter().enumerate() {
        out.push_str(&format!("\n  [{i}] x={} y={} w={} h={}", r.x, r.y, r.w, r.h));
    }
    Ok(out)
}
