use clap::Parser;
use tokio::runtime::Runtime;
use tracing::Level;

use muelle::cli::{Cli, Command};
use muelle::progress::ProgressBarObserver;
use muelle::session::UploadSession;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let runtime = Runtime::new().expect("Failed to create tokio runtime");
    if let Err(e) = runtime.block_on(run(cli)) {
        tracing::error!("{:#}", e);
        eprintln!("muelle: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Upload { files, .. } => {
            let config = cli.upload_config();
            let session = UploadSession::new(config)?;
            tracing::info!(guid = %session.token(), "Starting upload session");

            for path in files {
                let job = session
                    .add_file(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("staging {}: {:#}", path.display(), e))?;
                let observer = ProgressBarObserver::new();
                let report = session
                    .upload(&job, &observer)
                    .await
                    .map_err(|e| anyhow::anyhow!("uploading {}: {:#}", path.display(), e))?;
                tracing::info!(
                    file = %report.file_name,
                    bytes = report.bytes_sent,
                    chunks = report.chunks_sent,
                    "Done"
                );
            }
        }

        Command::List => {
            let session = UploadSession::new(cli.upload_config())?;
            let files = session.list().await?;
            if files.is_empty() {
                println!("(no files)");
            } else {
                for file in files {
                    println!("{:>12}  {}", file.size, file.name);
                }
            }
        }

        Command::Fetch { name, output } => {
            let session = UploadSession::new(cli.upload_config())?;
            let dest = output
                .clone()
                .unwrap_or_else(|| std::path::PathBuf::from(name));
            let bytes = session.fetch(name, &dest).await?;
            println!("{} ({} bytes) -> {}", name, bytes, dest.display());
        }
    }

    Ok(())
}
