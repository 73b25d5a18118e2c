//! Binary Registry: scans a directory of candidate ELF executables once
//! at construction and classifies each by `(architecture, engine,
//! exec-mode)`.

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::error::Error;
use crate::types::{Arch, ExecMode, FuzzingEngine};

/// The instrumentation marker every eligible binary must export a function
/// symbol containing.
const KLOCWORK_MARK: &str = "__klocwork";
/// Presence of any symbol containing this marks the sanitizer-based engine
/// (Honggfuzz); absence means the symbolic-execution engine (Triton).
const SANITIZER_MARK: &str = "__sanitizer";
/// Import name marking a persistent-mode (fork-server-less, loop-over-input)
/// binary.
const PERSISTENT_IMPORT: &str = "HF_ITER";

/// Key a [`BinaryRegistry`] indexes variants by.
pub type VariantKey = (Arch, FuzzingEngine, ExecMode);

/// Indexes ELF binaries by `(architecture, engine, exec-mode)`.
#[derive(Debug, Default)]
pub struct BinaryRegistry {
    variants: HashMap<VariantKey, PathBuf>,
}

impl BinaryRegistry {
    /// Scan `dir` once, classifying every regular file in it.
    ///
    /// Files are classified in **lexicographic filename order** so that key
    /// collisions resolve deterministically regardless of the underlying
    /// filesystem's directory-listing order.
    pub fn scan(dir: &Path) -> Result<Self, Error> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut registry = Self::default();
        for path in entries {
            match classify(&path) {
                Ok(Some((arch, engine, exec_mode))) => registry.insert(arch, engine, exec_mode, path),
                Ok(None) => {
                    log::debug!("ignore binary: {} (does not contain klocwork intrinsics)", path.display());
                }
                Err(reason) => {
                    log::warn!("binary {} not supported: {reason}", path.display());
                }
            }
        }
        Ok(registry)
    }

    fn insert(&mut self, arch: Arch, engine: FuzzingEngine, exec_mode: ExecMode, path: PathBuf) {
        let key = (arch, engine, exec_mode);
        if self.variants.contains_key(&key) {
            log::warn!(
                "binary with same properties ({arch}, {engine}, {exec_mode}) already detected, drop: {}",
                path.display()
            );
        } else {
            log::info!("new binary detected [{arch}, {engine}, {exec_mode}]: {}", path.display());
            self.variants.insert(key, path);
        }
    }

    /// Look up a variant by key; used exclusively by the Assignment Engine.
    pub fn get(&self, arch: Arch, engine: FuzzingEngine, exec_mode: ExecMode) -> Option<&Path> {
        self.variants.get(&(arch, engine, exec_mode)).map(PathBuf::as_path)
    }

    /// Build a registry directly from already-classified variants, bypassing
    /// `scan`'s ELF parsing. Used by the Assignment Engine's own tests,
    /// which need fixture binaries without fabricating real ELF bytes.
    #[cfg(test)]
    pub(crate) fn from_variants(variants: Vec<(VariantKey, PathBuf)>) -> Self {
        Self {
            variants: variants.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Pure, side-effect-free classification of one parsed ELF file, kept
/// separate from `scan` so it is testable with fixture binaries.
///
/// Returns `Ok(None)` for a file that parses but lacks the klocwork marker
/// (silently ignored, not an error); `Err` for anything not supported
/// (non-ELF, unknown architecture).
fn classify(path: &Path) -> Result<Option<(Arch, FuzzingEngine, ExecMode)>, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let elf = goblin::elf::Elf::parse(&bytes).map_err(|_| "not an ELF file".to_string())?;

    let mut has_klocwork = false;
    let mut has_sanitizer = false;
    for sym in elf.syms.iter() {
        let Some(name) = elf.strtab.get_at(sym.st_name) else {
            continue;
        };
        if name.contains(KLOCWORK_MARK) {
            has_klocwork = true;
        }
        if name.contains(SANITIZER_MARK) {
            has_sanitizer = true;
        }
    }
    if !has_klocwork {
        return Ok(None);
    }

    let has_persistent_import = elf
        .dynsyms
        .iter()
        .filter_map(|sym| elf.dynstrtab.get_at(sym.st_name))
        .any(|name| name == PERSISTENT_IMPORT)
        || elf
            .syms
            .iter()
            .filter_map(|sym| elf.strtab.get_at(sym.st_name))
            .any(|name| name == PERSISTENT_IMPORT);

    let arch = match elf.header.e_machine {
        goblin::elf::header::EM_X86_64 => Arch::X86_64,
        goblin::elf::header::EM_386 => Arch::X86,
        goblin::elf::header::EM_ARM => Arch::Armv7,
        goblin::elf::header::EM_AARCH64 => Arch::Aarch64,
        other => return Err(format!("unsupported architecture {other}")),
    };

    let engine = if has_sanitizer {
        FuzzingEngine::Honggfuzz
    } else {
        FuzzingEngine::Triton
    };
    let exec_mode = if has_persistent_import {
        ExecMode::Persistent
    } else {
        ExecMode::SingleExec
    };

    Ok(Some((arch, engine, exec_mode)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn non_elf_file_is_dropped_with_warning_not_error() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("not_elf.bin");
        std::fs::File::create(&p).unwrap().write_all(b"not an elf").unwrap();
        let registry = BinaryRegistry::scan(dir.path()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_directory_yields_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = BinaryRegistry::scan(dir.path()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
