use crate::domain::models::{FileRecord, GatherConfig};
use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub records: Vec<FileRecord>,
    pub processed_count: usize,
}

/// Splits a comma-separated flag value, dropping blanks.
pub fn parse_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Extension of a base name, lowercased and with its leading dot. A dotfile's
/// extension is its whole name, so `.env` has the extension `.env`.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[idx..].to_lowercase())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    include: HashSet<String>,
    exclude: HashSet<String>,
    exclude_names: HashSet<String>,
}

impl FileFilter {
    pub fn from_config(config: &GatherConfig) -> Self {
        Self {
            include: parse_list(&config.include)
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            exclude: parse_list(&config.exclude)
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            exclude_names: parse_list(&config.exclude_names),
        }
    }

    /// A hidden file is only kept when the include list names it outright,
    /// e.g. `--include .env`.
    fn names_file(&self, name: &str) -> bool {
        self.include.contains(&name.to_lowercase())
    }

    /// Whether the walk should descend into a directory.
    pub fn accepts_dir(&self, name: &str) -> bool {
        !self.exclude_names.contains(name) && !is_hidden(name)
    }

    /// Whether a path named on the command line sits under, or is, an
    /// excluded name. Only the part below the working directory is checked,
    /// so `/home/me/build/app` is not excluded by `build` when run from `app`.
    pub fn excludes_path(&self, path: &Path) -> bool {
        let relative = std::env::current_dir()
            .ok()
            .and_then(|cwd| path.strip_prefix(cwd).ok())
            .unwrap_or(path);
        relative.components().any(|c| match c {
            Component::Normal(name) => self.exclude_names.contains(name.to_string_lossy().as_ref()),
            _ => false,
        })
    }

    /// Whether a file with this base name should be read. Files named
    /// directly on the command line are exempt from the hidden-file rule.
    pub fn accepts_file(&self, name: &str, explicit: bool) -> bool {
        if self.exclude_names.contains(name) {
            return false;
        }

        let ext = extension_of(name);
        let ext_included = ext.as_ref().is_some_and(|e| self.include.contains(e));
        if !self.include.is_empty() && !ext_included && !self.names_file(name) {
            return false;
        }
        if ext.as_ref().is_some_and(|e| self.exclude.contains(e)) {
            return false;
        }
        if !explicit && is_hidden(name) && !self.names_file(name) {
            return false;
        }
        true
    }
}

struct IgnoreRule {
    matcher: GlobMatcher,
    negated: bool,
    dir_only: bool,
}

/// Patterns from the `.gitignore` at the top of a walked directory.
#[derive(Default)]
pub struct GitIgnore {
    rules: Vec<IgnoreRule>,
}

impl GitIgnore {
    pub fn load(root: &Path) -> Self {
        let path = root.join(".gitignore");
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let ignore = Self::parse(&contents);
                debug!(
                    "Loaded {} patterns from {}",
                    ignore.rules.len(),
                    path.display()
                );
                ignore
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Self {
        let mut rules = Vec::new();

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (negated, pattern) = match trimmed.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, trimmed),
            };
            let dir_only = pattern.ends_with('/');
            let pattern = pattern.trim_end_matches('/');
            // A slash anywhere but the end anchors the pattern to the root.
            let anchored = pattern.contains('/');
            let pattern = pattern.trim_start_matches('/');
            if pattern.is_empty() {
                continue;
            }

            let glob = if anchored || pattern.starts_with("**/") {
                pattern.to_string()
            } else {
                format!("**/{}", pattern)
            };

            match GlobBuilder::new(&glob).literal_separator(true).build() {
                Ok(g) => rules.push(IgnoreRule {
                    matcher: g.compile_matcher(),
                    negated,
                    dir_only,
                }),
                Err(e) => warn!("Skipping invalid .gitignore pattern {:?}: {}", trimmed, e),
            }
        }

        Self { rules }
    }

    /// Last matching rule wins, as in git.
    pub fn is_ignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.dir_only && !is_dir {
                continue;
            }
            if rule.matcher.is_match(rel_path) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

pub fn read_file_contents(path: &Path) -> anyhow::Result<String> {
    debug!("Reading file contents: {}", path.display());
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    debug!("Read {} bytes from file", contents.len());
    Ok(contents)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn push_record(path: &Path, outcome: &mut CollectionOutcome) {
    match read_file_contents(path) {
        Ok(content) => {
            outcome.records.push(FileRecord {
                path: path.to_string_lossy().to_string(),
                content,
            });
            outcome.processed_count += 1;
        }
        Err(e) => warn!("Skipping file: {:#}", e),
    }
}

fn keep_entry(entry: &DirEntry, root: &Path, filter: &FileFilter, gitignore: &GitIgnore) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    let is_dir = entry.file_type().is_dir();
    let name = entry.file_name().to_string_lossy();
    if is_dir && !filter.accepts_dir(&name) {
        debug!("Pruning directory: {}", entry.path().display());
        return false;
    }

    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    if gitignore.is_ignored(rel, is_dir) {
        debug!("Ignored by .gitignore: {}", entry.path().display());
        return false;
    }
    true
}

fn collect_from_dir(root: &Path, filter: &FileFilter, outcome: &mut CollectionOutcome) {
    let gitignore = GitIgnore::load(root);

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| keep_entry(e, root, filter, &gitignore))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            if !entry.file_type().is_dir() {
                debug!("Skipping non-regular file: {}", entry.path().display());
            }
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if filter.accepts_file(&name, false) {
            push_record(entry.path(), outcome);
        } else {
            debug!("Filtered out: {}", entry.path().display());
        }
    }
}

/// Walks every configured path and reads the files that pass the filters.
///
/// Nothing here is fatal: unreadable files and missing roots are logged and
/// contribute no records.
pub fn collect_files(config: &GatherConfig) -> CollectionOutcome {
    let filter = FileFilter::from_config(config);
    let mut outcome = CollectionOutcome::default();

    for raw in &config.paths {
        let root = Path::new(raw);
        if filter.excludes_path(root) {
            warn!("Skipping {}: excluded by --exclude-names", root.display());
            continue;
        }
        let metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot access path {}: {}", root.display(), e);
                continue;
            }
        };

        if metadata.is_dir() {
            info!("Scanning directory: {}", root.display());
            collect_from_dir(root, &filter, &mut outcome);
        } else if filter.accepts_file(&base_name(root), true) {
            push_record(root, &mut outcome);
        } else {
            debug!("Filtered out: {}", root.display());
        }
    }

    info!("Collected {} files", outcome.processed_count);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config_for(root: &Path) -> GatherConfig {
        GatherConfig {
            paths: vec![root.to_string_lossy().to_string()],
            ..GatherConfig::default()
        }
    }

    fn rel_paths(root: &Path, outcome: &CollectionOutcome) -> Vec<String> {
        outcome
            .records
            .iter()
            .map(|r| {
                PathBuf::from(&r.path)
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.go", "package main\n");
        write(root, "README.md", "# readme\n");
        write(root, "pkg/util.go", "package pkg\n");
        write(root, "pkg/util_test.go", "package pkg\n");
        write(root, "pkg/notes.txt", "notes\n");
        write(root, ".hidden.go", "package hidden\n");
        write(root, ".git/config.go", "package git\n");
        write(root, "vendor/dep.go", "package dep\n");
        dir
    }

    #[test]
    fn test_parse_list() {
        let set = parse_list(" .go, ,rs,,.md ");
        assert_eq!(set.len(), 3);
        assert!(set.contains(".go"));
        assert!(set.contains("rs"));
        assert!(set.contains(".md"));
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("main.go").as_deref(), Some(".go"));
        assert_eq!(extension_of("archive.TAR.GZ").as_deref(), Some(".gz"));
        assert_eq!(extension_of(".env").as_deref(), Some(".env"));
        assert_eq!(extension_of("Makefile"), None);
    }

    #[test]
    fn test_include_go_only_counts_go_files() {
        let dir = sample_tree();
        let config = GatherConfig {
            include: ".go".to_string(),
            exclude_names: "vendor".to_string(),
            ..config_for(dir.path())
        };

        let outcome = collect_files(&config);

        assert_eq!(outcome.processed_count, 3);
        assert_eq!(
            rel_paths(dir.path(), &outcome),
            vec!["main.go", "pkg/util.go", "pkg/util_test.go"]
        );
    }

    #[test]
    fn test_include_naming_hidden_file_keeps_it() {
        let dir = sample_tree();
        let config = GatherConfig {
            include: "go,.hidden.go".to_string(),
            ..config_for(dir.path())
        };

        let paths = rel_paths(dir.path(), &collect_files(&config));

        assert!(paths.contains(&".hidden.go".to_string()));
        assert!(!paths.iter().any(|p| p.starts_with(".git/")));
        assert!(paths.contains(&"vendor/dep.go".to_string()));
    }

    #[test]
    fn test_hidden_files_skipped_without_include() {
        let dir = sample_tree();
        let paths = rel_paths(dir.path(), &collect_files(&config_for(dir.path())));

        assert!(!paths.iter().any(|p| p.starts_with('.')));
        assert!(paths.contains(&"README.md".to_string()));
        assert!(paths.contains(&"pkg/notes.txt".to_string()));
    }

    #[test]
    fn test_exclude_applied_after_include() {
        let dir = sample_tree();
        let config = GatherConfig {
            include: ".go,.md".to_string(),
            exclude: ".MD".to_string(),
            exclude_names: "vendor,util_test.go".to_string(),
            ..config_for(dir.path())
        };

        let paths = rel_paths(dir.path(), &collect_files(&config));

        assert_eq!(paths, vec!["main.go", "pkg/util.go"]);
    }

    #[test]
    fn test_traversal_is_sorted_and_repeatable() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b/z.rs", "z");
        write(dir.path(), "a.rs", "a");
        write(dir.path(), "b/a.rs", "ba");
        write(dir.path(), "c.rs", "c");

        let config = config_for(dir.path());
        let first = collect_files(&config);
        let second = collect_files(&config);

        assert_eq!(
            rel_paths(dir.path(), &first),
            vec!["a.rs", "b/a.rs", "b/z.rs", "c.rs"]
        );
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_nonexistent_root_yields_nothing() {
        let config = GatherConfig {
            paths: vec!["/nonexistent".to_string()],
            ..GatherConfig::default()
        };

        let outcome = collect_files(&config);

        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_missing_root_does_not_stop_other_roots() {
        let dir = sample_tree();
        let config = GatherConfig {
            paths: vec![
                dir.path().join("missing").to_string_lossy().to_string(),
                dir.path().join("main.go").to_string_lossy().to_string(),
            ],
            ..GatherConfig::default()
        };

        let outcome = collect_files(&config);

        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.records[0].content, "package main\n");
    }

    #[test]
    fn test_explicit_hidden_file_is_read() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".env", "KEY=value\n");
        let config = config_for(&dir.path().join(".env"));

        assert_eq!(collect_files(&config).processed_count, 1);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.txt", "fine");
        fs::write(dir.path().join("binary.txt"), [0xffu8, 0xfe, 0x00, 0x80]).unwrap();

        let outcome = collect_files(&config_for(dir.path()));

        assert_eq!(rel_paths(dir.path(), &outcome), vec!["good.txt"]);
    }

    #[test]
    fn test_gitignore_patterns() {
        let ignore = GitIgnore::parse("# comment\n\n*.log\nbuild/\n/docs/*.md\n!keep.log\n");

        assert!(ignore.is_ignored(Path::new("server.log"), false));
        assert!(ignore.is_ignored(Path::new("logs/server.log"), false));
        assert!(!ignore.is_ignored(Path::new("logs/keep.log"), false));
        assert!(ignore.is_ignored(Path::new("build"), true));
        assert!(!ignore.is_ignored(Path::new("build"), false));
        assert!(ignore.is_ignored(Path::new("docs/intro.md"), false));
        assert!(!ignore.is_ignored(Path::new("docs/api/intro.md"), false));
        assert!(!ignore.is_ignored(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_gitignore_applied_during_walk() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".gitignore", "out/\n*.tmp\n");
        write(dir.path(), "lib.rs", "pub fn f() {}");
        write(dir.path(), "scratch.tmp", "tmp");
        write(dir.path(), "out/gen.rs", "generated");

        let paths = rel_paths(dir.path(), &collect_files(&config_for(dir.path())));

        assert_eq!(paths, vec!["lib.rs"]);
    }

    #[test]
    fn test_exclude_names_applies_to_given_paths() {
        let dir = sample_tree();
        let config = GatherConfig {
            paths: vec![
                dir.path().join("vendor").to_string_lossy().to_string(),
                dir.path().join("vendor/dep.go").to_string_lossy().to_string(),
            ],
            exclude_names: "vendor".to_string(),
            ..GatherConfig::default()
        };

        assert_eq!(collect_files(&config).processed_count, 0);

        let config = GatherConfig {
            exclude_names: "build".to_string(),
            ..config
        };
        assert_eq!(collect_files(&config).processed_count, 2);
    }

    #[test]
    fn test_excludes_path_ignores_dots() {
        let filter = FileFilter::from_config(&GatherConfig {
            exclude_names: "vendor".to_string(),
            ..GatherConfig::default()
        });

        assert!(filter.excludes_path(Path::new("vendor")));
        assert!(filter.excludes_path(Path::new("./vendor/dep.go")));
        assert!(!filter.excludes_path(Path::new("../src/main.go")));
        assert!(!filter.excludes_path(Path::new(".")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_collected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/real.rs", "fn real() {}\n");
        std::os::unix::fs::symlink("real.rs", dir.path().join("src/link.rs")).unwrap();
        std::os::unix::fs::symlink("missing.rs", dir.path().join("src/dangling.rs")).unwrap();

        let outcome = collect_files(&config_for(dir.path()));

        assert_eq!(rel_paths(dir.path(), &outcome), vec!["src/link.rs", "src/real.rs"]);
        assert_eq!(outcome.records[0].content, "fn real() {}\n");
    }

    #[test]
    fn test_read_file_contents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "test.txt", "Test content\n");

        let contents = read_file_contents(&dir.path().join("test.txt")).unwrap();
        assert_eq!(contents, "Test content\n");
        assert!(read_file_contents(&dir.path().join("nope.txt")).is_err());
    }
}
