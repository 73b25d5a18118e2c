//! CLI surface of the broker binary, mirrored on `libaflstar`'s
//! `clap`-derive CLIs: every broker construction argument becomes a named,
//! validated flag here.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::broker::BrokerConfig;
use crate::policy::BrokingPolicy;
use crate::types::CheckMode;

/// Coordinate a fleet of fuzzing engines attacking one target.
#[derive(Debug, Parser)]
#[command(name = "pastis-broker", version, about)]
pub struct Cli {
    /// Directory the campaign persists itself into (created if absent).
    #[arg(long, value_name = "DIR")]
    pub workspace: PathBuf,

    /// Path to the defect report (JSON-lines `Alert` records).
    #[arg(long, value_name = "FILE")]
    pub defect_report: PathBuf,

    /// Directory scanned once at startup for candidate ELF binaries.
    #[arg(long, value_name = "DIR")]
    pub binaries: PathBuf,

    /// Seed broking policy applied to newly-discovered seeds.
    #[arg(long, value_enum, default_value_t = PolicyArg::Full)]
    pub policy: PolicyArg,

    /// Whether engines run with every safety check enabled or disabled.
    #[arg(long, value_enum, default_value_t = CheckModeArg::CheckAll)]
    pub check_mode: CheckModeArg,

    /// Arguments forwarded to the target program, after `--`.
    #[arg(last = true)]
    pub argv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Full,
    NoTransmit,
    CoverageOrdered,
}

impl From<PolicyArg> for BrokingPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Full => BrokingPolicy::Full,
            PolicyArg::NoTransmit => BrokingPolicy::NoTransmit,
            PolicyArg::CoverageOrdered => BrokingPolicy::CoverageOrdered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckModeArg {
    CheckAll,
    CheckDisabled,
}

impl From<CheckModeArg> for CheckMode {
    fn from(value: CheckModeArg) -> Self {
        match value {
            CheckModeArg::CheckAll => CheckMode::CheckAll,
            CheckModeArg::CheckDisabled => CheckMode::CheckDisabled,
        }
    }
}

impl Cli {
    pub fn into_broker_config(self) -> BrokerConfig {
        BrokerConfig {
            workspace: self.workspace,
            defect_report: self.defect_report,
            binaries_dir: self.binaries,
            policy: self.policy.into(),
            check_mode: self.check_mode.into(),
            argv: self.argv,
        }
    }
}
