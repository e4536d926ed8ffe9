use acr_mcp::config::Args;
use acr_mcp::{AcrClient, Server, Toolbox};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let openacr_dir = args.openacr_dir();
    let mut client = AcrClient::new(&openacr_dir)
        .with_context(|| format!("cannot use OpenACR dir {}", openacr_dir.display()))?;
    tracing::info!(openacr_dir = %client.openacr_dir().display(), "OpenACR client initialized");

    if let Some(project) = &args.project {
        client
            .set_work_dir(Some(project.as_path()))
            .with_context(|| format!("cannot activate project {}", project.display()))?;
    }

    let mut server = Server::new(Toolbox::new(client));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server.run(stdin, tokio::io::stdout()).await?;
    Ok(())
}
