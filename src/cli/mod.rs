pub mod ask;
pub mod corpus_check;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::config::EmbeddingConfig;

const HF_BASE: &str = "https://huggingface.co/sentence-transformers";

/// Artifacts a sentence-transformers ONNX export ships with:
/// (path within the model repo, local filename).
const MODEL_ARTIFACTS: [(&str, &str); 2] = [
    ("onnx/model.onnx", "model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

fn artifact_url(model: &str, remote_path: &str) -> String {
    format!("{HF_BASE}/{model}/resolve/main/{remote_path}")
}

/// Fetch the configured embedding model's ONNX weights and tokenizer into
/// the cache directory. Files already present are left alone.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (remote_path, filename) in MODEL_ARTIFACTS {
        let dest = cache_dir.join(filename);
        if dest.exists() {
            println!("{filename} already present at {}", dest.display());
            continue;
        }
        println!("Fetching {filename} for {}...", config.model);
        fetch_artifact(&artifact_url(&config.model, remote_path), &dest).await?;
        println!("Saved {}", dest.display());
    }

    println!("Embedding model ready. Try `kotae ask` or `kotae serve`.");
    Ok(())
}

/// Stream a remote artifact to disk with a progress bar. Bytes go to a
/// `.part` file that is renamed into place once the download completes, so
/// an interrupted fetch never leaves a truncated artifact behind.
async fn fetch_artifact(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "server answered HTTP {} for {url}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.green/white} {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=>-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let part_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&part_path)
        .await
        .with_context(|| format!("failed to create {}", part_path.display()))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("error reading response body")?
    {
        file.write_all(&chunk)
            .await
            .context("error writing artifact")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part_path, dest)
        .await
        .context("failed to move artifact into place")?;

    pb.finish_and_clear();
    Ok(())
}
