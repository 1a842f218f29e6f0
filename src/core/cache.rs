use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{
    diagram::DiagramRequest,
    generator::{GenerateError, Generator},
};

/// Reuses artifacts rendered within `ttl` and deletes them once they expire.
///
/// Output paths are content addressed, so a hit means the same description,
/// type and scale were rendered recently. The sweep works off the output
/// directory itself and only deletes files older than `ttl + grace`, so a
/// file reported as a hit stays readable for at least `grace`.
pub struct CachingGenerator<G> {
    inner: G,
    dir: PathBuf,
    ttl: Duration,
    grace: Duration,
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl<G: Generator> CachingGenerator<G> {
    pub fn new(inner: G, dir: impl Into<PathBuf>, ttl: Duration, grace: Duration) -> Self {
        Self {
            inner,
            dir: dir.into(),
            ttl,
            grace,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn retention(&self) -> Duration {
        self.ttl + self.grace
    }

    fn is_fresh(&self, diagram: &DiagramRequest) -> bool {
        self.entries
            .lock()
            .get(diagram.output_path())
            .is_some_and(|created| created.elapsed() < self.ttl)
    }

    fn is_retained(&self, path: &Path) -> bool {
        self.entries
            .lock()
            .get(path)
            .is_some_and(|created| created.elapsed() < self.retention())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes every file in the output directory older than `ttl + grace`,
    /// including leftovers of earlier runs and cancelled renders, and forgets
    /// expired entries. Returns how many files were removed.
    pub async fn sweep(&self) -> usize {
        let retention = self.retention();
        self.entries
            .lock()
            .retain(|_, created| created.elapsed() < retention);

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("failed to scan {}: {}", self.dir.display(), e);
                }
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to scan {}: {}", self.dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() || !is_older_than(&metadata, retention) {
                continue;
            }
            // re-rendered since the last sweep
            if self.is_retained(&path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }
}

fn is_older_than(metadata: &std::fs::Metadata, age: Duration) -> bool {
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed >= age)
}

impl<G: Generator + 'static> CachingGenerator<G> {
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep().await;
                if removed > 0 {
                    tracing::debug!("removed {} expired diagrams", removed);
                }
            }
        })
    }
}

#[async_trait]
impl<G: Generator> Generator for CachingGenerator<G> {
    async fn generate(&self, diagram: &DiagramRequest) -> Result<(), GenerateError> {
        if self.is_fresh(diagram)
            && tokio::fs::try_exists(diagram.output_path())
                .await
                .unwrap_or(false)
        {
            tracing::debug!(id = diagram.id(), "serving cached diagram");
            return Ok(());
        }

        self.inner.generate(diagram).await?;
        self.entries
            .lock()
            .insert(diagram.output_path().to_path_buf(), Instant::now());
        Ok(())
    }
}
