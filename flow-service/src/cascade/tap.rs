// Taps
// Persisted resources read and written by flows

use crate::error::ServiceResult;

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

pub type SharedTap = Arc<dyn Tap>;

/// A named, persisted data resource.
///
/// The identifier is fully qualified: two taps only denote the same
/// resource when their identifiers are equal.
#[async_trait]
pub trait Tap: fmt::Debug + Send + Sync {
    fn identifier(&self) -> String;

    /// Constituent taps, when this tap is a union of several resources
    fn children(&self) -> Option<&[SharedTap]> {
        None
    }

    async fn exists(&self) -> ServiceResult<bool>;

    /// Last modification, `None` when the resource does not exist
    async fn modified_time(&self) -> ServiceResult<Option<SystemTime>>;

    async fn cleanup(&self) -> ServiceResult<()> {
        Ok(())
    }
}

/// Replace every composite tap by its physical constituents
pub fn flatten(taps: &[SharedTap]) -> Vec<SharedTap> {
    let mut result = Vec::new();
    for tap in taps {
        match tap.children() {
            Some(children) => result.extend(flatten(children)),
            None => result.push(Arc::clone(tap)),
        }
    }
    result
}

/// Distinct identifiers of the flattened taps, in first-seen order
pub fn identifiers(taps: &[SharedTap]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for tap in flatten(taps) {
        let id = tap.identifier();
        if !result.contains(&id) {
            result.push(id);
        }
    }
    result
}

/// A file or directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FileTap {
    path: PathBuf,
}

impl FileTap {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Tap for FileTap {
    fn identifier(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn exists(&self) -> ServiceResult<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn modified_time(&self) -> ServiceResult<Option<SystemTime>> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Logical union of several taps read as one source
#[derive(Debug, Clone)]
pub struct MultiSourceTap {
    taps: Vec<SharedTap>,
}

impl MultiSourceTap {
    pub fn new(taps: Vec<SharedTap>) -> Self {
        Self { taps }
    }
}

#[async_trait]
impl Tap for MultiSourceTap {
    fn identifier(&self) -> String {
        let ids: Vec<String> = self.taps.iter().map(|tap| tap.identifier()).collect();
        format!("multi:[{}]", ids.join(","))
    }

    fn children(&self) -> Option<&[SharedTap]> {
        Some(&self.taps)
    }

    async fn exists(&self) -> ServiceResult<bool> {
        for tap in &self.taps {
            if !tap.exists().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Newest modification among the children
    async fn modified_time(&self) -> ServiceResult<Option<SystemTime>> {
        let mut newest = None;
        for tap in &self.taps {
            match tap.modified_time().await? {
                Some(time) => newest = newest.max(Some(time)),
                None => return Ok(None),
            }
        }
        Ok(newest)
    }

    async fn cleanup(&self) -> ServiceResult<()> {
        for tap in &self.taps {
            tap.cleanup().await?;
        }
        Ok(())
    }
}

/// True when the sinks must be rebuilt from the sources.
///
/// Sinks are stale when there are none, when any of them is missing, or when
/// the oldest sink predates the newest source.
pub async fn sinks_stale(sources: &[SharedTap], sinks: &[SharedTap]) -> ServiceResult<bool> {
    let sinks = flatten(sinks);
    if sinks.is_empty() {
        return Ok(true);
    }

    let mut oldest_sink: Option<SystemTime> = None;
    for sink in &sinks {
        match sink.modified_time().await? {
            Some(time) => {
                oldest_sink = Some(oldest_sink.map_or(time, |oldest| oldest.min(time)));
            }
            None => return Ok(true),
        }
    }

    let mut newest_source: Option<SystemTime> = None;
    for source in flatten(sources) {
        newest_source = newest_source.max(source.modified_time().await?);
    }

    Ok(match (oldest_sink, newest_source) {
        (Some(sink), Some(source)) => sink < source,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::testing::MemoryTap;

    use std::time::Duration;

    #[test]
    fn test_flatten_nested_composites() {
        let inner: SharedTap = Arc::new(MultiSourceTap::new(vec![
            MemoryTap::shared("b"),
            MemoryTap::shared("c"),
        ]));
        let outer: SharedTap = Arc::new(MultiSourceTap::new(vec![MemoryTap::shared("a"), inner]));

        let ids: Vec<String> = flatten(&[outer, MemoryTap::shared("d")])
            .iter()
            .map(|tap| tap.identifier())
            .collect();
        assert_eq!(ids, vec!["mem://a", "mem://b", "mem://c", "mem://d"]);
    }

    #[test]
    fn test_identifiers_are_distinct() {
        let ids = identifiers(&[MemoryTap::shared("a"), MemoryTap::shared("a")]);
        assert_eq!(ids, vec!["mem://a"]);
    }

    #[test]
    fn test_file_tap_identifier_is_absolute() {
        let tap = FileTap::new("relative/out.txt");
        assert!(tap.path().is_absolute());
        assert!(tap.identifier().starts_with("file:///"));
        assert!(tap.identifier().ends_with("relative/out.txt"));
    }

    #[tokio::test]
    async fn test_file_tap_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let tap = FileTap::new(&path);

        assert!(!tap.exists().await.unwrap());
        assert!(tap.modified_time().await.unwrap().is_none());

        std::fs::write(&path, "hello").unwrap();
        assert!(tap.exists().await.unwrap());
        assert!(tap.modified_time().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_staleness() {
        let now = SystemTime::now();
        let older = now - Duration::from_secs(60);

        let source = MemoryTap::modified("in", now);
        let old_sink = MemoryTap::modified("out", older);
        let new_sink = MemoryTap::modified("out", now + Duration::from_secs(1));

        assert!(sinks_stale(&[source.clone()], &[old_sink]).await.unwrap());
        assert!(!sinks_stale(&[source.clone()], &[new_sink]).await.unwrap());
        assert!(sinks_stale(&[source.clone()], &[MemoryTap::shared("missing")])
            .await
            .unwrap());
        assert!(sinks_stale(&[source], &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_multi_source_modified_is_newest() {
        let now = SystemTime::now();
        let tap = MultiSourceTap::new(vec![
            MemoryTap::modified("a", now - Duration::from_secs(10)),
            MemoryTap::modified("b", now),
        ]);

        assert_eq!(tap.modified_time().await.unwrap(), Some(now));
        assert!(tap.exists().await.unwrap());
    }
}
