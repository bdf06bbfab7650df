//! Logical model of the directory under test
//!
//! Owned by the controller; workers never see it. The tree describes what
//! the workload is expected to leave on the mounts - seed names from the
//! optional names file plus the generated-name population - and is used to
//! report and sanity-check, never to enforce strict correctness.

use crate::workload::{CREATED_TAG, MOVED_TAG};

/// Expected contents of the test directory for one run
#[derive(Debug, Clone)]
pub struct DirTree {
    test_dir: String,
    seed_names: Vec<String>,
    expected_files: u64,
}

impl DirTree {
    /// Build the model. `seed_names` comes from the names file when one
    /// exists; without it the workload uses generated names only.
    pub fn new(
        test_dir: impl Into<String>,
        seed_names: Option<Vec<String>>,
        expected_files: u64,
    ) -> Self {
        Self {
            test_dir: test_dir.into(),
            seed_names: seed_names.unwrap_or_default(),
            expected_files,
        }
    }

    pub fn test_dir(&self) -> &str {
        &self.test_dir
    }

    pub fn seed_names(&self) -> &[String] {
        &self.seed_names
    }

    pub fn expected_files(&self) -> u64 {
        self.expected_files
    }

    /// Whether a file name belongs to the workload population (carries the
    /// created or moved tag in either toggle state).
    pub fn is_workload_name(name: &str) -> bool {
        name.contains(CREATED_TAG) || name.contains(MOVED_TAG)
    }

    /// One-line description for the controller's state logs.
    pub fn summary(&self) -> String {
        format!(
            "{} expected files under '{}' ({} seed names)",
            self.expected_files,
            self.test_dir,
            self.seed_names.len()
        )
    }
}
