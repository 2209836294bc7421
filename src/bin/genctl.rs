use std::path::PathBuf;

use clap::{Parser, Subcommand};
use genrelay::{Config, GenerationRequest, Orchestrator, ProviderKind, UploadValidator};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "genctl", about = "CLI for the image generation relay", version)]
struct Cli {
    /// Override GENERATED_DIR
    #[arg(global = true, long, value_name = "PATH")]
    generated_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which providers have credentials
    Status,
    /// Run one generation locally and print the result as JSON
    Generate {
        /// Prompt text; the default fashion prompt is used when omitted
        #[arg(long)]
        prompt: Option<String>,
        /// Reference image, stored in UPLOADS_DIR like an HTTP upload
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Force a provider: huggingface or replicate
        #[arg(long)]
        service: Option<ProviderKind>,
        /// Do not fall back to Replicate when Hugging Face fails
        #[arg(long)]
        no_fallback: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    Config::dotenv_load();
    let cli = Cli::parse();

    let mut conf = Config::from_env()?;
    if let Some(dir) = cli.generated_dir {
        conf.generated_dir = dir;
    }

    match cli.command {
        Commands::Status => {
            for provider in ProviderKind::ALL {
                if conf.is_configured(provider) {
                    println!("{:<13} configured", provider.label());
                } else {
                    println!("{:<13} missing ({})", provider.label(), provider.setup_instructions());
                }
            }
            Ok(())
        }
        Commands::Generate { prompt, image, service, no_fallback } => {
            let orchestrator = Orchestrator::new(&conf);
            orchestrator.store().ensure_dirs().await?;

            let asset = match image {
                Some(path) => {
                    let data = tokio::fs::read(&path).await?;
                    let file_name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default()
                        .to_string();
                    let media_type = mime_guess::from_path(&path).first_or_octet_stream();
                    let asset = UploadValidator::default()
                        .accept(orchestrator.store(), "image", &file_name, media_type.essence_str(), &data)
                        .await?;
                    Some(asset)
                }
                None => None,
            };

            let mut request = GenerationRequest::new(prompt).with_asset(asset).prefer(service);
            if no_fallback {
                request = request.without_fallback();
            }

            match orchestrator.generate(request).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(genrelay::AppError::Generation(failure)) => {
                    eprintln!("{}", serde_json::to_string_pretty(&failure.to_body())?);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&json!({ "error": e.to_string() }))?);
                    std::process::exit(1);
                }
            }
        }
    }
}
