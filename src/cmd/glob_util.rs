//! Expansion of dump paths given as glob patterns.
//!
//! `dumps/*.sql.gz` translates every matching dump in one invocation, with
//! each file's database inferred from its name.

use std::path::{Path, PathBuf};

/// Result of expanding a file pattern (either a literal path or glob pattern).
#[derive(Debug)]
pub struct ExpandedFiles {
    pub files: Vec<PathBuf>,
    pub pattern_was_glob: bool,
}

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Expand a dump path or glob pattern into the files to translate.
///
/// A literal path must exist. A glob must match at least one regular file;
/// matches are returned sorted.
pub fn expand_file_pattern(pattern: &Path) -> anyhow::Result<ExpandedFiles> {
    let pattern_str = pattern.to_string_lossy();

    if !is_glob_pattern(&pattern_str) {
        if !pattern.exists() {
            anyhow::bail!("input file does not exist: {}", pattern.display());
        }
        return Ok(ExpandedFiles {
            files: vec![pattern.to_path_buf()],
            pattern_was_glob: false,
        });
    }

    let mut files = Vec::new();
    for entry in glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
    {
        let path = entry
            .map_err(|e| anyhow::anyhow!("error reading path for pattern '{}': {}", pattern_str, e))?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        anyhow::bail!("no files match pattern: {}", pattern_str);
    }

    files.sort();

    Ok(ExpandedFiles {
        files,
        pattern_was_glob: true,
    })
}

/// Outcome of translating several dumps in one invocation.
#[derive(Debug, Default)]
pub struct MultiFileResult {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl MultiFileResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_glob_pattern() {
        assert!(!is_glob_pattern("registry.sql"));
        assert!(!is_glob_pattern("/backup/registry.sql.gz"));
        assert!(is_glob_pattern("*.sql"));
        assert!(is_glob_pattern("backup/notary*.sql"));
        assert!(is_glob_pattern("registry?.sql"));
        assert!(is_glob_pattern("[rn]*.sql"));
    }

    #[test]
    fn test_expand_literal_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("registry.sql");
        fs::write(&file, "-- dump\n").unwrap();

        let result = expand_file_pattern(&file).unwrap();
        assert!(!result.pattern_was_glob);
        assert_eq!(result.files, vec![file]);

        let missing = expand_file_pattern(&dir.path().join("notaryserver.sql")).unwrap_err();
        assert!(missing.to_string().contains("does not exist"));
    }

    #[test]
    fn test_expand_glob_sorted_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("registry.sql"), "").unwrap();
        fs::write(dir.path().join("notarysigner.sql"), "").unwrap();
        fs::write(dir.path().join("notaryserver.sql"), "").unwrap();
        fs::create_dir(dir.path().join("old.sql")).unwrap();

        let result = expand_file_pattern(&dir.path().join("*.sql")).unwrap();
        assert!(result.pattern_was_glob);
        let names: Vec<_> = result
            .files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["notaryserver.sql", "notarysigner.sql", "registry.sql"]);
    }

    #[test]
    fn test_expand_glob_no_matches() {
        let dir = TempDir::new().unwrap();
        let err = expand_file_pattern(&dir.path().join("*.sql")).unwrap_err();
        assert!(err.to_string().contains("no files match"));
    }

    #[test]
    fn test_multi_file_result() {
        let mut result = MultiFileResult::new();
        result.record_success();
        result.record_failure(PathBuf::from("clair.sql"), "unsupported".to_string());

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(result.has_failures());
    }
}
