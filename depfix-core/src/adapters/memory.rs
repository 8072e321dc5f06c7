use crate::ports::{RepoView, WritePort};
use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Repository held in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepoView {
    files: BTreeMap<Utf8PathBuf, Vec<u8>>,
}

impl InMemoryRepoView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, rel: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(rel.into(), contents.into());
        self
    }
}

impl RepoView for InMemoryRepoView {
    fn list_sources(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> anyhow::Result<Vec<Utf8PathBuf>> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Pattern::new(p).with_context(|| format!("invalid pattern `{}`", p)))
                .collect::<anyhow::Result<Vec<_>>>()
        };
        let include = compile(include)?;
        let exclude = compile(exclude)?;

        Ok(self
            .files
            .keys()
            .filter(|rel| !rel.components().any(|c| c.as_str().starts_with('.')))
            .filter(|rel| include.iter().any(|p| p.matches(rel.as_str())))
            .filter(|rel| !exclude.iter().any(|p| p.matches(rel.as_str())))
            .cloned()
            .collect())
    }

    fn read_bytes(&self, rel: &Utf8Path) -> anyhow::Result<Vec<u8>> {
        self.files
            .get(rel)
            .cloned()
            .ok_or_else(|| anyhow!("read {}: no such file", rel))
    }
}

/// Records writes instead of touching disk; selected paths can be made to fail.
#[derive(Debug, Default)]
pub struct InMemoryWritePort {
    written: Mutex<BTreeMap<Utf8PathBuf, Vec<u8>>>,
    failing: BTreeSet<Utf8PathBuf>,
}

impl InMemoryWritePort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` fail.
    pub fn failing_on(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn written(&self) -> BTreeMap<Utf8PathBuf, Vec<u8>> {
        self.lock().clone()
    }

    pub fn written_text(&self, path: &Utf8Path) -> Option<String> {
        self.lock()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Utf8PathBuf, Vec<u8>>> {
        self.written.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WritePort for InMemoryWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if self.failing.contains(path) {
            return Err(anyhow!("write {}: permission denied", path));
        }
        self.lock().insert(path.to_owned(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_applies_include_exclude_and_hidden() {
        let repo = InMemoryRepoView::new()
            .with_file("b.py", "b")
            .with_file("a.py", "a")
            .with_file("venv/x.py", "x")
            .with_file(".git/hooks/h.py", "h")
            .with_file("README.md", "r");
        let listed = repo
            .list_sources(&["**/*.py".to_string()], &["venv/**".to_string()])
            .unwrap();
        assert_eq!(listed, vec![Utf8PathBuf::from("a.py"), Utf8PathBuf::from("b.py")]);
    }

    #[test]
    fn failing_writes_are_not_recorded() {
        let port = InMemoryWritePort::new().failing_on("/repo/a_fixed.py");
        assert!(port.write_file(Utf8Path::new("/repo/a_fixed.py"), b"x").is_err());
        port.write_file(Utf8Path::new("/repo/b_fixed.py"), b"y").unwrap();
        assert_eq!(port.written().len(), 1);
        assert_eq!(
            port.written_text(Utf8Path::new("/repo/b_fixed.py")).as_deref(),
            Some("y")
        );
    }
}
