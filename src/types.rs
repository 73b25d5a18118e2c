//! Fixed, tagged-variant enums shared by every component.
//!
//! Each enum below ships a manually-written `ALL` slice in declared
//! enumeration order. The least-frequent-first assignment pick and the
//! coverage-mode tie-break iterate these slices directly; no runtime
//! reflection is involved.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A fuzzing engine capable of attacking the target.
///
/// Declaration order is significant: it is the tie-break order used by the
/// Assignment Engine when two engines are equally least-used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuzzingEngine {
    Triton,
    Honggfuzz,
}

impl FuzzingEngine {
    pub const ALL: [FuzzingEngine; 2] = [FuzzingEngine::Triton, FuzzingEngine::Honggfuzz];

    /// Short tag embedded in seed filenames (`TT`, `HF`) and in a client's
    /// `Cli-<N>-<tag>` string id.
    pub fn tag(self) -> &'static str {
        match self {
            FuzzingEngine::Triton => "TT",
            FuzzingEngine::Honggfuzz => "HF",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "TT" => Some(FuzzingEngine::Triton),
            "HF" => Some(FuzzingEngine::Honggfuzz),
            _ => None,
        }
    }

    /// Whether the engine supports more than one [`CoverageMode`].
    ///
    /// Honggfuzz only knows basic-block coverage; Triton (symbolic
    /// execution) can be steered by block/edge/path granularity.
    pub fn supports_coverage_strategy(self) -> bool {
        matches!(self, FuzzingEngine::Triton)
    }
}

impl Display for FuzzingEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FuzzingEngine::Triton => write!(f, "TRITON"),
            FuzzingEngine::Honggfuzz => write!(f, "HONGGFUZZ"),
        }
    }
}

/// CPU architecture of a target binary / client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    X86,
    X86_64,
    Armv7,
    Aarch64,
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arch::X86 => "X86",
            Arch::X86_64 => "X86_64",
            Arch::Armv7 => "ARMV7",
            Arch::Aarch64 => "AARCH64",
        };
        write!(f, "{s}")
    }
}

/// Coverage granularity an engine measures progress at.
///
/// Declaration order is the tie-break order used among coverage modes that
/// are equally least-used within an engine (`BLOCK < EDGE < PATH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoverageMode {
    Block,
    Edge,
    Path,
}

impl CoverageMode {
    pub const ALL: [CoverageMode; 3] = [CoverageMode::Block, CoverageMode::Edge, CoverageMode::Path];
}

impl Display for CoverageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoverageMode::Block => "BLOCK",
            CoverageMode::Edge => "EDGE",
            CoverageMode::Path => "PATH",
        };
        write!(f, "{s}")
    }
}

/// How the target process is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecMode {
    SingleExec,
    Persistent,
}

impl Display for ExecMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecMode::SingleExec => "SINGLE_EXEC",
            ExecMode::Persistent => "PERSISTENT",
        };
        write!(f, "{s}")
    }
}

/// Class of safety assertions the engine enforces while running the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckMode {
    CheckAll,
    CheckDisabled,
}

/// Where a seed is injected into the target.
///
/// Fixed to `Stdin` in this version; the variant exists so a future
/// injection location is a non-breaking addition rather than a rewrite of
/// the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedInjectLoc {
    Stdin,
}

/// The kind of a seed in the pool / on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedType {
    Input,
    Crash,
    Hang,
}

impl SeedType {
    pub const ALL: [SeedType; 3] = [SeedType::Input, SeedType::Crash, SeedType::Hang];
}

/// Log severity forwarded from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// A client's self-reported fuzzing state, carried by `TELEMETRY` and
/// otherwise ignored in this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Starting,
    Running,
    Stopped,
}

/// Campaign-wide lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignState {
    Configuring,
    Running,
    Stopping,
    Terminated,
}
