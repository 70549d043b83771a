// src/canonical/corpus.rs
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only training corpus, one variant per line.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    path: PathBuf,
}

impl TrainingCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every non-empty trimmed line, in file order. A missing file is an
    /// empty corpus.
    pub async fn read_all(&self) -> Result<Vec<String>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Training corpus {} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read training corpus {}", self.path.display())
                })
            }
        };
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Appends one variant as its own line. Line breaks inside the variant
    /// become spaces, and a missing trailing newline in the file is repaired
    /// first so the variant never fuses with the previous line.
    pub async fn append(&self, variant: &str) -> Result<()> {
        let line = variant.replace(['\r', '\n'], " ");
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let needs_separator = match fs::read(&self.path).await {
            Ok(bytes) => bytes.last().map_or(false, |b| *b != b'\n'),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read training corpus {}", self.path.display())
                })
            }
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open training corpus {}", self.path.display()))?;
        let mut payload = String::with_capacity(line.len() + 2);
        if needs_separator {
            payload.push('\n');
        }
        payload.push_str(line);
        payload.push('\n');
        file.write_all(payload.as_bytes())
            .await
            .with_context(|| format!("Failed to append to training corpus {}", self.path.display()))?;
        file.flush().await?;
        debug!("Appended '{}' to training corpus", line);
        Ok(())
    }

    /// Writes `seed` as the corpus if the file is missing or holds no variants.
    pub async fn seed_if_empty<I, S>(&self, seed: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.read_all().await?.is_empty() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut contents = String::new();
        let mut count = 0;
        for variant in seed {
            contents.push_str(variant.as_ref().trim());
            contents.push('\n');
            count += 1;
        }
        fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to seed training corpus {}", self.path.display()))?;
        info!(
            "Seeded training corpus {} with {} variants",
            self.path.display(),
            count
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = TrainingCorpus::new(dir.path().join("missing.txt"));
        assert!(corpus.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_repairs_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        std::fs::write(&path, "Thailand\nBrazil").unwrap();
        let corpus = TrainingCorpus::new(&path);
        corpus.append("  Thailandd \n").await.unwrap();
        corpus.append("Taiwan").await.unwrap();
        corpus.append("   ").await.unwrap();
        assert_eq!(
            corpus.read_all().await.unwrap(),
            vec!["Thailand", "Brazil", "Thailandd", "Taiwan"]
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Thailand\nBrazil\nThailandd\nTaiwan\n"
        );
    }

    #[tokio::test]
    async fn test_embedded_line_breaks_become_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = TrainingCorpus::new(dir.path().join("corpus.txt"));
        corpus.append("Korea,\nRepublic of").await.unwrap();
        assert_eq!(corpus.read_all().await.unwrap(), vec!["Korea, Republic of"]);
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = TrainingCorpus::new(dir.path().join("nested").join("corpus.txt"));
        assert!(corpus.seed_if_empty(["Brazil", "Chad"]).await.unwrap());
        assert!(!corpus.seed_if_empty(["Peru"]).await.unwrap());
        assert_eq!(corpus.read_all().await.unwrap(), vec!["Brazil", "Chad"]);
    }
}
