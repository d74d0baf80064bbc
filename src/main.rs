//! cmdsage CLI binary entry point.

use clap::Parser;
use tokio_stream::StreamExt;

use cmdsage::agent::App;
use cmdsage::cli::{self, Cli};
use cmdsage::config::CmdsageConfig;
use cmdsage::session::SessionId;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CmdsageConfig::from_env();
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(dir) = &cli.session_dir {
        config.session_dir = Some(dir.clone());
    }
    if config.api_key.is_none() {
        eprintln!("please provide your Google API key in GOOGLE_API_KEY");
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, config: &CmdsageConfig) -> cmdsage::error::Result<()> {
    let app = App::new(config)?;
    let instruction = cli.instruction_text();

    match (&cli.resume, cli.stream) {
        (None, false) => {
            let (session_id, response) = app.start(&instruction).await?;
            eprintln!("session: {session_id}");
            cli::render_final(&response);
        }
        (Some(id), false) => {
            let session_id = SessionId::from(id.as_str());
            let response = app.resume(&session_id, &instruction).await?;
            cli::render_final(&response);
        }
        (None, true) => {
            let (session_id, mut stream) = app.start_stream(&instruction).await?;
            eprintln!("session: {session_id}");
            while let Some(turn) = stream.next().await {
                cli::render_turn(&turn);
            }
            if let Some(response) = app.final_response(&session_id).await? {
                cli::render_final(&response);
            }
        }
        (Some(id), true) => {
            let session_id = SessionId::from(id.as_str());
            let mut stream = app.resume_stream(&session_id, &instruction).await?;
            while let Some(turn) = stream.next().await {
                cli::render_turn(&turn);
            }
            if let Some(response) = app.final_response(&session_id).await? {
                cli::render_final(&response);
            }
        }
    }

    Ok(())
}
