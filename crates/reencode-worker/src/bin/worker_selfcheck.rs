use std::path::Path;

use reencode_client::CoordinatorClient;
use reencode_media::{check_ffmpeg, check_ffprobe};
use reencode_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    let work_dir = config
        .encode
        .work_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    println!(
        "worker-selfcheck: starting with work_dir={} coordinator={}",
        work_dir.display(),
        config.client.base_url
    );

    ensure_workdir(&work_dir).await?;
    ensure_tools(&config)?;
    ensure_coordinator(&config).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::Builder::new()
        .prefix("selfcheck-")
        .tempdir_in(path)
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_tools(config: &WorkerConfig) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg(&config.encode.ffmpeg)?;
    let ffprobe = check_ffprobe(&config.encode.ffprobe)?;
    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

async fn ensure_coordinator(config: &WorkerConfig) -> anyhow::Result<()> {
    let client = CoordinatorClient::new(config.client.clone())?;
    if !client.health().await? {
        return Err(anyhow::anyhow!(
            "coordinator at {} is not healthy",
            client.base_url()
        ));
    }
    Ok(())
}
