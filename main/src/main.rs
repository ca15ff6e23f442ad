use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use common::{
    storage::store::{ByteStream, StorageManager},
    utils::config::{get_config, AppConfig},
};
use futures::TryStreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "docqa", about = "Move documents in and out of the configured bucket")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file to the bucket
    Upload {
        path: PathBuf,
        /// Object key; defaults to the file name
        #[arg(long)]
        key: Option<String>,
    },
    /// Download an object from the bucket
    Fetch {
        key: String,
        /// Destination file; defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;
    info!(backend = ?config.storage, bucket = %config.aws_bucket_name, "Configuration loaded");

    run(cli.command, &config).await
}

async fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let storage = StorageManager::new(config).await;

    match command {
        Command::Upload { path, key } => {
            let key = match key {
                Some(key) => key,
                None => default_key(&path)?,
            };
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;

            if !storage.upload(file, &key).await {
                bail!("upload of {} failed", path.display());
            }
            info!(key = %key, "Upload complete");
        }
        Command::Fetch { key, out } => {
            let Some(stream) = storage.fetch(&key).await else {
                bail!("could not fetch {key}");
            };
            match out {
                Some(out) => {
                    let mut file = tokio::fs::File::create(&out)
                        .await
                        .with_context(|| format!("creating {}", out.display()))?;
                    let written = write_body(stream, &mut file).await?;
                    info!(bytes = written, path = %out.display(), "Wrote object to file");
                }
                None => {
                    write_body(stream, &mut tokio::io::stdout()).await?;
                }
            }
            info!(key = %key, "Fetch complete");
        }
    }

    Ok(())
}

fn default_key(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

async fn write_body<W>(mut stream: ByteStream, writer: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written: u64 = 0;
    while let Some(chunk) = stream.try_next().await? {
        writer.write_all(&chunk).await?;
        written = written.saturating_add(chunk.len() as u64);
    }
    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::store::testing::test_config_local;

    #[tokio::test]
    async fn upload_then_fetch_through_local_backend() {
        let data_dir = tempfile::tempdir().expect("data dir");
        let work_dir = tempfile::tempdir().expect("work dir");
        let config = test_config_local(data_dir.path());

        let source = work_dir.path().join("report.txt");
        tokio::fs::write(&source, b"quarterly numbers")
            .await
            .expect("write source");

        run(
            Command::Upload {
                path: source,
                key: None,
            },
            &config,
        )
        .await
        .expect("upload");

        let out = work_dir.path().join("copy.txt");
        run(
            Command::Fetch {
                key: "report.txt".into(),
                out: Some(out.clone()),
            },
            &config,
        )
        .await
        .expect("fetch");

        let copied = tokio::fs::read(&out).await.expect("read copy");
        assert_eq!(copied, b"quarterly numbers");
    }

    #[tokio::test]
    async fn fetch_of_missing_object_is_an_error() {
        let data_dir = tempfile::tempdir().expect("data dir");
        let config = test_config_local(data_dir.path());

        let result = run(
            Command::Fetch {
                key: "missing.txt".into(),
                out: None,
            },
            &config,
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn default_key_is_the_file_name() {
        assert_eq!(
            default_key(Path::new("/tmp/docs/manual.pdf")).expect("key"),
            "manual.pdf"
        );
        assert!(default_key(Path::new("/")).is_err());
    }

    #[test]
    fn cli_parses_upload_with_key() {
        let cli = Cli::try_parse_from(["docqa", "upload", "a.txt", "--key", "docs/a.txt"])
            .expect("parse");

        match cli.command {
            Command::Upload { path, key } => {
                assert_eq!(path, PathBuf::from("a.txt"));
                assert_eq!(key.as_deref(), Some("docs/a.txt"));
            }
            Command::Fetch { .. } => panic!("expected upload"),
        }
    }
}
