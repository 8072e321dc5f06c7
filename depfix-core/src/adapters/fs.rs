use crate::ports::{RepoView, WritePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use std::collections::BTreeSet;
use tracing::debug;

/// Repository access rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsRepoView {
    root: Utf8PathBuf,
}

impl FsRepoView {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RepoView for FsRepoView {
    fn list_sources(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> anyhow::Result<Vec<Utf8PathBuf>> {
        let excludes = exclude
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("invalid exclude pattern `{}`", p)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let escaped_root = Pattern::escape(self.root.as_str());

        let mut found = BTreeSet::new();
        for pattern in include {
            let full = format!("{}/{}", escaped_root, pattern);
            let entries = glob::glob(&full)
                .with_context(|| format!("invalid include pattern `{}`", pattern))?;
            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        debug!("skipping unreadable entry: {}", err);
                        continue;
                    }
                };
                let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                    continue;
                };
                if !path.is_file() {
                    continue;
                }
                let rel = path
                    .strip_prefix(&self.root)
                    .map(Utf8Path::to_path_buf)
                    .unwrap_or(path);
                if is_hidden(&rel) || excludes.iter().any(|p| p.matches(rel.as_str())) {
                    continue;
                }
                found.insert(rel);
            }
        }
        Ok(found.into_iter().collect())
    }

    fn read_bytes(&self, rel: &Utf8Path) -> anyhow::Result<Vec<u8>> {
        let path = self.root.join(rel);
        fs_err::read(&path).with_context(|| format!("read {}", path))
    }
}

fn is_hidden(rel: &Utf8Path) -> bool {
    rel.components().any(|c| {
        let name = c.as_str();
        name.starts_with('.') && name != "." && name != ".."
    })
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs_err::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs_err::write(path, contents).with_context(|| format!("write {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        for rel in [
            "main.py",
            "pkg/util.py",
            "pkg/util_fixed.py",
            "venv/lib/site.py",
            ".hidden/secret.py",
            "notes.txt",
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "print('hi')\n").unwrap();
        }
        (temp, root)
    }

    #[test]
    fn lists_python_sources_sorted_without_hidden_or_excluded() {
        let (_temp, root) = repo();
        let view = FsRepoView::new(root);
        let settings = crate::settings::WorkflowSettings::default();
        let sources = view
            .list_sources(&settings.include, &settings.exclude)
            .unwrap();
        let names: Vec<&str> = sources.iter().map(|p| p.as_str()).collect();
        // Derived outputs are filtered by the Analyze stage, not here.
        assert_eq!(names, vec!["main.py", "pkg/util.py", "pkg/util_fixed.py"]);
    }

    #[test]
    fn write_port_creates_parents() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let target = root.join("a/b/c_fixed.py");
        FsWritePort.write_file(&target, b"x = 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "x = 1\n");
    }

    #[test]
    fn read_bytes_reports_missing_path() {
        let (_temp, root) = repo();
        let view = FsRepoView::new(root);
        let err = view.read_bytes(Utf8Path::new("missing.py")).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.py"));
    }
}
