//! Workspace: the on-disk directory a campaign persists itself into, so it
//! can be resumed.
//!
//! ```text
//! <workspace>/
//!   corpus/   <timestamp>_<client-strid>_<md5>.cov   (INPUT)
//!   crashes/  same pattern                           (CRASH)
//!   hangs/    same pattern                           (HANG)
//!   logs/     per-client log files + broker.log
//!   results.csv                                      (mirror of Defect Report)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;
use crate::types::{FuzzingEngine, SeedType};

pub const INPUT_DIR: &str = "corpus";
pub const CRASH_DIR: &str = "crashes";
pub const HANGS_DIR: &str = "hangs";
pub const LOG_DIR: &str = "logs";
pub const CSV_FILE: &str = "results.csv";
pub const BROKER_LOG_FILE: &str = "broker.log";

/// The engine assumed for a seed filename that fails to parse: files whose
/// names do not match default to the sanitizer-based engine (kept as-is,
/// see DESIGN.md).
const FALLBACK_ENGINE: FuzzingEngine = FuzzingEngine::Honggfuzz;

/// Authoritative seed-filename regex.
static SEED_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}:\d{2}:\d{2}_Cli-\d+-+([A-Z]+)_[0-9a-f]+\.cov$")
        .expect("static regex is valid")
});

/// A loaded-from-disk seed, ready to feed the Seed Pool.
pub struct LoadedSeed {
    pub bytes: Vec<u8>,
    pub seed_type: SeedType,
    pub origin: FuzzingEngine,
}

/// The on-disk campaign directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create (or reuse) the workspace root and its fixed subdirectories.
    /// An un-creatable workspace root is a fatal startup error, surfaced
    /// here as `Err`.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        for sub in [INPUT_DIR, CRASH_DIR, HANGS_DIR, LOG_DIR] {
            let p = root.join(sub);
            if !p.exists() {
                fs::create_dir(&p)?;
            }
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.root.join(CSV_FILE)
    }

    pub fn broker_log_path(&self) -> PathBuf {
        self.root.join(BROKER_LOG_FILE)
    }

    fn dir_for(&self, seed_type: SeedType) -> PathBuf {
        let sub = match seed_type {
            SeedType::Input => INPUT_DIR,
            SeedType::Crash => CRASH_DIR,
            SeedType::Hang => HANGS_DIR,
        };
        self.root.join(sub)
    }

    /// Persist a seed's bytes under the type-appropriate subdirectory.
    pub fn write_seed(&self, seed_type: SeedType, client_strid: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H:%M:%S");
        let digest = format!("{:x}", md5::compute(bytes));
        let filename = format!("{timestamp}_{client_strid}_{digest}.cov");
        let path = self.dir_for(seed_type).join(filename);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Load every seed in the workspace.
    ///
    /// A filename that fails the authoritative regex, or whose capture
    /// group is not a known engine tag, loads with [`FALLBACK_ENGINE`] and
    /// a warning rather than failing the whole load.
    pub fn load_seeds(&self) -> Result<Vec<LoadedSeed>, Error> {
        let mut loaded = Vec::new();
        for (seed_type, dir_name) in [
            (SeedType::Input, INPUT_DIR),
            (SeedType::Crash, CRASH_DIR),
            (SeedType::Hang, HANGS_DIR),
        ] {
            let dir = self.root.join(dir_name);
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.path().is_file() {
                    continue;
                }
                let filename = entry.file_name();
                let filename = filename.to_string_lossy();
                let origin = match SEED_FILENAME_RE.captures(&filename) {
                    Some(caps) => {
                        let tag = &caps[1];
                        FuzzingEngine::from_tag(tag).unwrap_or_else(|| {
                            log::warn!("seed file {filename} has unknown engine tag '{tag}', using fallback");
                            FALLBACK_ENGINE
                        })
                    }
                    None => {
                        log::warn!("seed file {filename} does not match the naming convention, using fallback engine");
                        FALLBACK_ENGINE
                    }
                };
                let bytes = fs::read(entry.path())?;
                loaded.push(LoadedSeed { bytes, seed_type, origin });
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_fixed_subdirectories() {
        let dir = tempdir().unwrap();
        let ws = Workspace::init(dir.path().join("campaign")).unwrap();
        for sub in [INPUT_DIR, CRASH_DIR, HANGS_DIR, LOG_DIR] {
            assert!(ws.root().join(sub).is_dir());
        }
    }

    #[test]
    fn write_then_load_round_trips_origin_engine() {
        let dir = tempdir().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();
        ws.write_seed(SeedType::Input, "Cli-0-TT", b"hello").unwrap();
        ws.write_seed(SeedType::Crash, "Cli-1-HF", b"world").unwrap();

        let loaded = ws.load_seeds().unwrap();
        assert_eq!(loaded.len(), 2);
        let input = loaded.iter().find(|s| s.seed_type == SeedType::Input).unwrap();
        assert_eq!(input.origin, FuzzingEngine::Triton);
        let crash = loaded.iter().find(|s| s.seed_type == SeedType::Crash).unwrap();
        assert_eq!(crash.origin, FuzzingEngine::Honggfuzz);
    }

    #[test]
    fn unmatched_filename_falls_back_with_warning_not_error() {
        let dir = tempdir().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();
        fs::write(dir.path().join(INPUT_DIR).join("garbage.cov"), b"x").unwrap();
        let loaded = ws.load_seeds().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].origin, FALLBACK_ENGINE);
    }
}
