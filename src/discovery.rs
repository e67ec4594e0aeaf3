use anyhow::Result;
use futures::stream::{self, Stream, StreamExt};
use glob::{glob_with, MatchOptions};
use ignore::{WalkBuilder, WalkState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for file discovery behavior
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// File extension to match, without the dot (default: `out`)
    pub extension: String,
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
    /// File names never treated as inputs, compared case-insensitively
    /// (default: the tables this tool exports)
    pub excluded_names: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extension: "out".to_string(),
            fail_fast: false,
            excluded_names: crate::export::export_file_names(),
        }
    }
}

impl DiscoveryConfig {
    fn matches(&self, file_name: &str) -> bool {
        let extension_matches = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        extension_matches
            && !self
                .excluded_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(file_name))
    }

    fn matches_path(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.matches(n))
    }
}

/// Result of file discovery validation
#[derive(Debug, Clone)]
pub struct FileValidation {
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Discovers all files matching `**/*.<extension>` recursively under the given root directory.
/// Returns an async stream of validated file paths.
///
/// # Arguments
/// * `root_dir` - Root directory to search recursively
/// * `config` - Discovery configuration (extension, fail_fast behavior)
pub fn discover_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> impl Stream<Item = Result<FileValidation>> {
    let root_path = root_dir.as_ref().to_path_buf();

    stream::unfold(
        DiscoveryState::new(root_path, config),
        |mut state| async move { state.next_file().await.map(|result| (result, state)) },
    )
}

/// Parallel directory traversal using the `ignore` walker
/// WHY: deep simulation trees (one directory per load case) walk faster across threads than with glob
pub fn discover_files_parallel(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> impl Stream<Item = Result<FileValidation>> {
    let root_path = root_dir.as_ref().to_path_buf();
    let config = Arc::new(config);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        info!("Starting directory traversal in: {}", root_path.display());
        let traversal_start = std::time::Instant::now();

        let walker = WalkBuilder::new(&root_path)
            .threads((num_cpus::get() / 2).max(1))
            .follow_links(false)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .build_parallel();

        let (result_tx, result_rx) = std::sync::mpsc::channel();
        let walk_config = Arc::clone(&config);

        // WHY: the ignore walker blocks, so it runs on its own thread and streams paths back
        std::thread::spawn(move || {
            walker.run(|| {
                let result_tx = result_tx.clone();
                let walk_config = Arc::clone(&walk_config);
                Box::new(move |result| {
                    if let Ok(entry) = result {
                        let is_match = entry.file_type().is_some_and(|ft| ft.is_file())
                            && walk_config.matches_path(entry.path());
                        if is_match {
                            debug!("Found matching file: {}", entry.path().display());
                            let _ = result_tx.send(entry.path().to_path_buf());
                        }
                    }
                    WalkState::Continue
                })
            });
        });

        let mut file_count = 0;
        while let Ok(path) = result_rx.recv() {
            file_count += 1;
            match validate_file(path, &config).await {
                Ok(validation) => {
                    if tx.send(Ok(validation)).is_err() {
                        debug!("Receiver dropped, stopping discovery");
                        break;
                    }
                }
                Err(e) => {
                    if config.fail_fast {
                        let _ = tx.send(Err(e));
                        break;
                    }
                    warn!("File validation error (continuing): {}", e);
                }
            }
        }

        info!(
            "Discovery completed in {}ms, streamed {} files",
            traversal_start.elapsed().as_millis(),
            file_count
        );
    });

    stream::unfold(rx, |mut receiver| async move {
        receiver.recv().await.map(|result| (result, receiver))
    })
}

async fn validate_file(path: PathBuf, config: &DiscoveryConfig) -> Result<FileValidation> {
    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => Ok(FileValidation { path, error: None }),
        Ok(_) => {
            let error = format!("Path is not a file: {}", path.display());
            warn!("{}", error);
            Ok(FileValidation { path, error: Some(error) })
        }
        Err(e) => {
            let error = format!("Cannot access file {}: {}", path.display(), e);
            warn!("{}", error);
            if config.fail_fast {
                Err(anyhow::anyhow!(error))
            } else {
                Ok(FileValidation { path, error: Some(error) })
            }
        }
    }
}

/// Internal state for file discovery iteration
struct DiscoveryState {
    root_dir: PathBuf,
    config: DiscoveryConfig,
    glob_iter: Option<glob::Paths>,
}

impl DiscoveryState {
    fn new(root_dir: PathBuf, config: DiscoveryConfig) -> Self {
        Self {
            root_dir,
            config,
            glob_iter: None,
        }
    }

    async fn next_file(&mut self) -> Option<Result<FileValidation>> {
        if self.glob_iter.is_none() {
            let root = glob::Pattern::escape(&self.root_dir.to_string_lossy());
            let pattern = format!("{}/**/*.{}", root, self.config.extension);
            debug!("Starting file discovery with pattern: {}", pattern);

            // WHY: simulation trees copied from Windows often carry upper-case `.OUT` names
            let options = MatchOptions {
                case_sensitive: false,
                ..Default::default()
            };
            match glob_with(&pattern, options) {
                Ok(paths) => {
                    self.glob_iter = Some(paths);
                    info!("File discovery initialized for root: {}", self.root_dir.display());
                }
                Err(e) => {
                    return Some(Err(anyhow::anyhow!("Failed to create glob pattern: {}", e)));
                }
            }
        }

        let glob_iter = self.glob_iter.as_mut()?;
        loop {
            match glob_iter.next()? {
                Ok(path) if self.config.matches_path(&path) => {
                    debug!("Found file: {}", path.display());
                    return Some(validate_file(path, &self.config).await);
                }
                Ok(path) => {
                    debug!("Skipping excluded file: {}", path.display());
                }
                Err(e) => {
                    let error_msg = format!("Glob iteration error: {e}");
                    warn!("{}", error_msg);
                    if self.config.fail_fast {
                        return Some(Err(anyhow::anyhow!(error_msg)));
                    }
                }
            }
        }
    }
}

async fn collect_stream(
    stream: impl Stream<Item = Result<FileValidation>>,
    label: &str,
) -> Result<Vec<FileValidation>> {
    let mut stream = Box::pin(stream);
    let mut files = Vec::new();
    while let Some(result) = stream.next().await {
        files.push(result?);
    }

    // WHY: walk order is filesystem dependent; batches are processed in path order
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let valid_count = files.iter().filter(|f| f.error.is_none()).count();
    let invalid_count = files.len() - valid_count;
    if invalid_count > 0 {
        warn!("Found {} files with validation issues", invalid_count);
    }
    info!("{} discovery summary: {} valid, {} invalid", label, valid_count, invalid_count);

    Ok(files)
}

/// Collect all discovered files, sorted by path
pub async fn collect_discovered_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<FileValidation>> {
    collect_stream(discover_files(root_dir, config), "Serial").await
}

/// Collect all discovered files using parallel directory traversal, sorted by path
pub async fn collect_discovered_files_parallel(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<FileValidation>> {
    collect_stream(discover_files_parallel(root_dir, config), "Parallel").await
}

/// Paths of all accessible output files under `root_dir`
pub async fn find_output_files<P: AsRef<Path>>(root_dir: P, config: DiscoveryConfig) -> Result<Vec<PathBuf>> {
    let validations = collect_discovered_files(root_dir, config).await?;
    Ok(validations
        .into_iter()
        .filter(|v| v.error.is_none())
        .map(|v| v.path)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;
        Ok(file_path)
    }

    #[tokio::test]
    async fn test_discover_files_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 0);
    }

    #[tokio::test]
    async fn test_discover_files_matching_extension() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "10ws_seed1.out", "x").await.unwrap();
        create_test_file(temp_dir.path(), "dlc12/12ws_seed1.out", "x").await.unwrap();
        create_test_file(temp_dir.path(), "10ws_seed1.outb", "binary").await.unwrap();
        create_test_file(temp_dir.path(), "notes.txt", "ignore me").await.unwrap();

        let files = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.error.is_none()));

        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"10ws_seed1.out".to_string()));
        assert!(names.contains(&"12ws_seed1.out".to_string()));
    }

    #[tokio::test]
    async fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "a.dat", "x").await.unwrap();
        create_test_file(temp_dir.path(), "b.out", "x").await.unwrap();

        let config = DiscoveryConfig { extension: "dat".to_string(), ..Default::default() };
        let paths = find_output_files(temp_dir.path(), config).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("a.dat"));
    }

    #[tokio::test]
    async fn test_parallel_vs_serial_discovery() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            create_test_file(temp_dir.path(), &format!("case{i}/{i}ws_seed1.out"), "x")
                .await
                .unwrap();
        }
        create_test_file(temp_dir.path(), "readme.md", "x").await.unwrap();

        let serial = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        let parallel = collect_discovered_files_parallel(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();

        assert_eq!(serial.len(), 5);
        assert_eq!(parallel.len(), 5);
        let serial_paths: Vec<_> = serial.iter().map(|f| &f.path).collect();
        let parallel_paths: Vec<_> = parallel.iter().map(|f| &f.path).collect();
        assert_eq!(serial_paths, parallel_paths);
    }

    #[tokio::test]
    async fn test_upper_case_extension_found_by_both_walkers() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "RUN_SEED1.OUT", "x").await.unwrap();
        create_test_file(temp_dir.path(), "run_seed2.out", "x").await.unwrap();
        create_test_file(temp_dir.path(), "dlc/Run_Seed3.Out", "x").await.unwrap();

        let serial = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        let parallel = collect_discovered_files_parallel(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();

        assert_eq!(serial.len(), 3);
        let serial_paths: Vec<_> = serial.iter().map(|f| &f.path).collect();
        let parallel_paths: Vec<_> = parallel.iter().map(|f| &f.path).collect();
        assert_eq!(serial_paths, parallel_paths);
    }

    #[tokio::test]
    async fn test_exported_tables_not_rediscovered() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "10ws_seed1.csv", "x").await.unwrap();
        create_test_file(temp_dir.path(), "file_summaries.csv", "x").await.unwrap();
        create_test_file(temp_dir.path(), "POWER_CURVE.csv", "x").await.unwrap();

        let config = DiscoveryConfig { extension: "csv".to_string(), ..Default::default() };
        let serial = find_output_files(temp_dir.path(), config.clone()).await.unwrap();
        let parallel = collect_discovered_files_parallel(temp_dir.path(), config)
            .await
            .unwrap();

        assert_eq!(serial.len(), 1);
        assert!(serial[0].ends_with("10ws_seed1.csv"));
        assert_eq!(parallel.len(), 1);
        assert_eq!(parallel[0].path, serial[0]);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let config = DiscoveryConfig::default();
        assert!(config.matches("A.OUT"));
        assert!(config.matches("b.out"));
        assert!(!config.matches("c.outb"));
        assert!(!config.matches("out"));

        let txt = DiscoveryConfig { extension: "txt".to_string(), ..Default::default() };
        assert!(txt.matches("12ws_seed2.TXT"));
        assert!(!txt.matches("power_curve.TXT"));
    }
}
