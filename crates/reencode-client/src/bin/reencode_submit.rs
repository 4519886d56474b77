//! Command-line submitter for the job coordinator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reencode_client::{ClientConfig, CoordinatorClient};
use reencode_models::{Job, JobId};

#[derive(Parser, Debug)]
#[command(name = "reencode-submit")]
#[command(about = "Submit files to the reencode coordinator and track them")]
struct Args {
    /// Coordinator base URL
    #[arg(long, env = "COORDINATOR_URL", default_value = "http://127.0.0.1:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push files (directories are walked recursively)
    Push {
        /// Files or directories to submit
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Extensions never submitted when walking directories
        #[arg(long, value_delimiter = ',', default_value = "nfo,sub,idx,txt")]
        skip_ext: Vec<String>,

        /// Wait until every pushed job is done
        #[arg(long)]
        wait: bool,

        /// Seconds between status polls while waiting
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the status of a job
    Status {
        /// Job ID
        job: String,
    },
    /// Remove finished jobs older than `delta` seconds
    Gc {
        #[arg(long)]
        delta: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,reencode=info")),
        )
        .init();

    let args = Args::parse();
    let client = CoordinatorClient::new(ClientConfig::from_env().with_base_url(args.url))
        .context("failed to build HTTP client")?;

    match args.command {
        Commands::Push {
            paths,
            skip_ext,
            wait,
            poll_interval,
            timeout,
        } => {
            let files = collect_files(&paths, &skip_ext)?;
            if files.is_empty() {
                bail!("no files to submit");
            }

            let mut pushed = Vec::with_capacity(files.len());
            for file in &files {
                let job = client
                    .push(file)
                    .await
                    .with_context(|| format!("failed to push {}", file))?;
                println!("{}\t{}", job.id, job.file);
                pushed.push(job.id);
            }
            info!(count = pushed.len(), "Submitted jobs");

            if wait {
                let failed = wait_all(
                    &client,
                    &pushed,
                    Duration::from_secs(poll_interval),
                    timeout.map(Duration::from_secs),
                )
                .await?;
                if failed > 0 {
                    bail!("{} of {} jobs failed", failed, pushed.len());
                }
            }
        }
        Commands::Status { job } => {
            let job = client.get_status(&JobId::from(job)).await?;
            print_job(&job);
        }
        Commands::Gc { delta } => {
            let removed = client.gc(delta.map(Duration::from_secs)).await?;
            for id in &removed {
                println!("{}", id);
            }
            info!(count = removed.len(), "Collected jobs");
        }
    }

    Ok(())
}

/// Wait for each job in turn. Returns the number that failed.
async fn wait_all(
    client: &CoordinatorClient,
    ids: &[JobId],
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<usize> {
    let mut failed = 0;
    for id in ids {
        let job = client
            .wait_for_completion(id, poll_interval, timeout)
            .await
            .with_context(|| format!("failed waiting for job {}", id))?;
        print_job(&job);
        if job.success() != Some(true) {
            failed += 1;
        }
    }
    Ok(failed)
}

fn print_job(job: &Job) {
    println!("{}\t{}\t{}", job.id, job.status, job.file);
}

/// Expand `paths` into absolute file paths, walking directories.
fn collect_files(paths: &[PathBuf], skip_ext: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        if path.is_dir() {
            walk(&path, skip_ext, &mut files)?;
        } else {
            files.push(path_string(&path)?);
        }
    }
    Ok(files)
}

fn walk(dir: &Path, skip_ext: &[String], files: &mut Vec<String>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, skip_ext, files)?;
        } else if is_skipped(&path, skip_ext) {
            info!(file = %path.display(), "Skipping");
        } else {
            files.push(path_string(&path)?);
        }
    }
    Ok(())
}

fn is_skipped(path: &Path, skip_ext: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| skip_ext.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn path_string(path: &Path) -> Result<String> {
    match path.to_str() {
        Some(s) => Ok(s.to_string()),
        None => {
            warn!(file = %path.display(), "Path is not valid UTF-8");
            bail!("path is not valid UTF-8: {}", path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_skipped() {
        let skip = vec!["nfo".to_string(), "txt".to_string()];
        assert!(is_skipped(Path::new("/v/movie.nfo"), &skip));
        assert!(is_skipped(Path::new("/v/README.TXT"), &skip));
        assert!(!is_skipped(Path::new("/v/movie.mkv"), &skip));
        assert!(!is_skipped(Path::new("/v/noext"), &skip));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "reencode-submit",
            "--url",
            "http://coord:9000",
            "push",
            "--wait",
            "--skip-ext",
            "nfo,srt",
            "/videos",
        ]);
        assert_eq!(args.url, "http://coord:9000");
        match args.command {
            Commands::Push { paths, skip_ext, wait, .. } => {
                assert_eq!(paths, vec![PathBuf::from("/videos")]);
                assert_eq!(skip_ext, vec!["nfo", "srt"]);
                assert!(wait);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
