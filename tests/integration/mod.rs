// Integration test utilities and common code
// WHY: centralized utilities avoid duplication across integration tests
#![allow(dead_code)]

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use windcurve::FileInput;

/// Temporary directory populated with simulation output files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self { temp_dir, root_path }
    }

    /// Write an output file, creating parent directories as needed
    pub fn create_output_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// File-backed inputs for the given relative paths, in order
    pub fn inputs<P: AsRef<Path>>(&self, relative_paths: &[P]) -> Vec<FileInput> {
        relative_paths
            .iter()
            .map(|p| FileInput::from_path(self.root_path.join(p)))
            .collect()
    }
}
