//! Stat Manager: in-memory aggregation of per-client telemetry and seed
//! counters.
//!
//! No persistence guarantees in this version: values exist only for the
//! lifetime of the broker process, observable through
//! [`StatManager::snapshot`] for a future UI hook.

use std::collections::BTreeMap;

use crate::client::ClientNetId;
use crate::types::SeedType;

/// Telemetry last reported by one client's `TELEMETRY` messages.
///
/// Each field is `None` until the client reports it at least once; setters
/// are idempotent overwrites.
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry {
    pub exec_per_sec: Option<u64>,
    pub total_exec: Option<u64>,
    pub cycle: Option<u64>,
    pub timeout: Option<u64>,
    pub coverage_block: Option<u64>,
    pub coverage_edge: Option<u64>,
    pub coverage_path: Option<u64>,
    pub last_cov_update: Option<u64>,
}

/// Seed counters partitioned by `(type, is-new)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedCounters {
    new_inputs: u64,
    dup_inputs: u64,
    new_crashes: u64,
    dup_crashes: u64,
    new_hangs: u64,
    dup_hangs: u64,
}

impl SeedCounters {
    fn bump(&mut self, seed_type: SeedType, is_new: bool) {
        let counter = match (seed_type, is_new) {
            (SeedType::Input, true) => &mut self.new_inputs,
            (SeedType::Input, false) => &mut self.dup_inputs,
            (SeedType::Crash, true) => &mut self.new_crashes,
            (SeedType::Crash, false) => &mut self.dup_crashes,
            (SeedType::Hang, true) => &mut self.new_hangs,
            (SeedType::Hang, false) => &mut self.dup_hangs,
        };
        *counter += 1;
    }

    pub fn count(&self, seed_type: SeedType, is_new: bool) -> u64 {
        match (seed_type, is_new) {
            (SeedType::Input, true) => self.new_inputs,
            (SeedType::Input, false) => self.dup_inputs,
            (SeedType::Crash, true) => self.new_crashes,
            (SeedType::Crash, false) => self.dup_crashes,
            (SeedType::Hang, true) => self.new_hangs,
            (SeedType::Hang, false) => self.dup_hangs,
        }
    }
}

/// Everything the Stat Manager knows about one client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientStats {
    pub telemetry: Telemetry,
    pub seeds: SeedCounters,
}

/// Per-client aggregation of telemetry and seed counts.
#[derive(Debug, Default)]
pub struct StatManager {
    clients: BTreeMap<u64, ClientStats>,
}

impl StatManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, client: ClientNetId) -> &mut ClientStats {
        self.clients.entry(client.0).or_default()
    }

    pub fn update_seed_stat(&mut self, client: ClientNetId, seed_type: SeedType, is_new: bool) {
        self.entry(client).seeds.bump(seed_type, is_new);
    }

    pub fn set_exec_per_sec(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.exec_per_sec = Some(v);
        }
    }

    pub fn set_total_exec(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.total_exec = Some(v);
        }
    }

    pub fn set_cycle(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.cycle = Some(v);
        }
    }

    pub fn set_timeout(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.timeout = Some(v);
        }
    }

    pub fn set_coverage_block(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.coverage_block = Some(v);
        }
    }

    pub fn set_coverage_edge(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.coverage_edge = Some(v);
        }
    }

    pub fn set_coverage_path(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.coverage_path = Some(v);
        }
    }

    pub fn set_last_coverage_update(&mut self, client: ClientNetId, v: Option<u64>) {
        if let Some(v) = v {
            self.entry(client).telemetry.last_cov_update = Some(v);
        }
    }

    /// A read-only, ordered snapshot for a future UI hook.
    pub fn snapshot(&self) -> &BTreeMap<u64, ClientStats> {
        &self.clients
    }
}

/// Renders a `TELEMETRY` field for a log line: `-` for anything not yet
/// reported.
pub fn render_field(v: Option<u64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_are_idempotent_overwrites() {
        let mut stats = StatManager::new();
        let cli = ClientNetId(1);
        stats.set_exec_per_sec(cli, Some(10));
        stats.set_exec_per_sec(cli, Some(20));
        assert_eq!(stats.snapshot()[&1].telemetry.exec_per_sec, Some(20));
    }

    #[test]
    fn missing_field_renders_as_dash() {
        assert_eq!(render_field(None), "-");
        assert_eq!(render_field(Some(5)), "5");
    }

    #[test]
    fn seed_counters_partition_by_type_and_novelty() {
        let mut stats = StatManager::new();
        let cli = ClientNetId(1);
        stats.update_seed_stat(cli, SeedType::Input, true);
        stats.update_seed_stat(cli, SeedType::Input, false);
        stats.update_seed_stat(cli, SeedType::Crash, true);
        let s = &stats.snapshot()[&1].seeds;
        assert_eq!(s.count(SeedType::Input, true), 1);
        assert_eq!(s.count(SeedType::Input, false), 1);
        assert_eq!(s.count(SeedType::Crash, true), 1);
        assert_eq!(s.count(SeedType::Hang, true), 0);
    }
}
