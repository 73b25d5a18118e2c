//! Broker Core: the event loop consuming messages from the transport,
//! applying policies, and driving every other component.
//!
//! The inbound message kinds (`HELLO`, `SEED`, `LOG`, `TELEMETRY`,
//! `STOP_COVERAGE`, `DATA`) each become a `handle_*` method here; a
//! concrete `Transport` implementation is expected to call these from its
//! own dispatch loop, holding one typed handler slot per message kind.

use std::path::PathBuf;

use hashbrown::HashMap;

use crate::assignment;
use crate::binary_registry::BinaryRegistry;
use crate::client::{Assignment, Client, ClientNetId, ClientRegistry};
use crate::defect_report::DefectReport;
use crate::error::Error;
use crate::policy::BrokingPolicy;
use crate::seed_pool::{SeedPool, Submission};
use crate::stats::{render_field, StatManager};
use crate::transport::{StartMessage, Transport};
use crate::types::{Arch, CampaignState, CheckMode, FuzzingEngine, LogLevel, SeedInjectLoc, SeedType, State};
use crate::workspace::Workspace;

/// Everything a [`Broker`] needs at construction that an operator or CLI
/// supplies.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub workspace: PathBuf,
    pub defect_report: PathBuf,
    pub binaries_dir: PathBuf,
    pub policy: BrokingPolicy,
    pub check_mode: CheckMode,
    pub argv: Vec<String>,
}

/// Singleton, process-wide campaign state, owned by an explicit `Broker`
/// rather than a global.
pub struct Broker {
    workspace: Workspace,
    binaries: BinaryRegistry,
    defect_report: DefectReport,
    seed_pool: SeedPool,
    clients: ClientRegistry,
    stats: StatManager,
    policy: BrokingPolicy,
    check_mode: CheckMode,
    argv: Vec<String>,
    engine_args: HashMap<FuzzingEngine, String>,
    state: CampaignState,
}

impl Broker {
    /// CONFIGURING: load every registry from the workspace and config. A
    /// Defect Report load failure or an un-creatable workspace root are the
    /// only fatal startup errors, both surfaced as `Err` here.
    pub fn new(config: BrokerConfig) -> Result<Self, Error> {
        let workspace = Workspace::init(&config.workspace)?;
        let binaries = BinaryRegistry::scan(&config.binaries_dir)?;
        let defect_report = DefectReport::load(&config.defect_report)?;

        let mut seed_pool = SeedPool::new();
        for loaded in workspace.load_seeds()? {
            seed_pool.load(loaded.bytes, loaded.seed_type, loaded.origin);
        }

        let engine_args = FuzzingEngine::ALL.iter().map(|e| (*e, String::new())).collect();
        let log_dir = workspace.logs_dir();

        Ok(Self {
            workspace,
            binaries,
            defect_report,
            seed_pool,
            clients: ClientRegistry::new(Some(log_dir)),
            stats: StatManager::new(),
            policy: config.policy,
            check_mode: config.check_mode,
            argv: config.argv,
            engine_args,
            state: CampaignState::Configuring,
        })
    }

    pub fn state(&self) -> CampaignState {
        self.state
    }

    pub fn seed_pool(&self) -> &SeedPool {
        &self.seed_pool
    }

    pub fn defect_report(&self) -> &DefectReport {
        &self.defect_report
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn stats(&self) -> &StatManager {
        &self.stats
    }

    /// Set per-engine arguments forwarded in `START`.
    pub fn set_engine_args(&mut self, engine: FuzzingEngine, args: String) {
        if self
            .engine_args
            .get(&engine)
            .is_some_and(|existing| !existing.is_empty())
        {
            log::warn!("arguments were already set for engine {engine}");
        }
        self.engine_args.insert(engine, args);
    }

    /// RUNNING: flips the campaign state and starts every not-yet-running
    /// client.
    pub fn start(&mut self, transport: &mut dyn Transport) {
        self.state = CampaignState::Running;
        log::info!("[broker] start broking");
        // Iterate idle clients in insertion (`Client::id`) order: the engine
        // histogram `start_client` consults is updated after each
        // assignment, so which simultaneously-idle client lands on which
        // engine depends on the order they're visited in. `ClientRegistry`
        // is a `hashbrown` map with no iteration-order guarantee, so the
        // order has to be pinned explicitly here.
        let mut idle: Vec<&Client> = self.clients.iter().filter(|c| !c.is_running()).collect();
        idle.sort_by_key(|c| c.id);
        let netids: Vec<ClientNetId> = idle.iter().map(|c| c.netid).collect();
        for netid in netids {
            self.start_client(transport, netid);
        }
    }

    fn start_client(&mut self, transport: &mut dyn Transport, netid: ClientNetId) {
        let Some(client) = self.clients.get(netid) else {
            return;
        };
        let Some(result) = assignment::assign(client, &self.clients, &self.binaries) else {
            let strid = client.strid();
            let engines: Vec<FuzzingEngine> = client.engines.iter().map(|(e, _)| *e).collect();
            log::error!("no suitable engine or program was found for client {strid} {engines:?}");
            return;
        };

        let assignment = Assignment {
            engine: result.engine,
            coverage_mode: result.coverage_mode,
            exec_mode: result.exec_mode,
            check_mode: self.check_mode,
        };

        let Some(client) = self.clients.get_mut(netid) else {
            return;
        };
        client.set_running(assignment);
        let strid = client.strid();
        log::info!(
            "[broker] send start client {}: {} {} {}",
            strid,
            result.engine,
            result.coverage_mode,
            result.exec_mode
        );

        let engine_args = self.engine_args.get(&result.engine).cloned().unwrap_or_default();
        let defect_report_json = self.defect_report.to_json().unwrap_or_default();
        let msg = StartMessage {
            program: result.program,
            argv: self.argv.clone(),
            exec_mode: result.exec_mode,
            check_mode: self.check_mode,
            coverage_mode: result.coverage_mode,
            engine: result.engine,
            engine_args,
            inject_loc: SeedInjectLoc::Stdin,
            defect_report_json,
        };
        if let Err(e) = transport.send_start(netid, msg) {
            log::error!("failed to send start to {strid}: {e}");
        }
    }

    /// Unknown-client handling: log a warning, send a synchronous stop, and
    /// let the caller discard the message.
    fn warn_unknown(&self, transport: &mut dyn Transport, netid: ClientNetId) {
        log::warn!("[broker] client '{netid}' unknown (send stop)");
        let _ = transport.send_stop(netid);
    }

    /// `HELLO(engines, arch, cpus, memory)`.
    pub fn handle_hello(
        &mut self,
        transport: &mut dyn Transport,
        netid: ClientNetId,
        engines: Vec<(FuzzingEngine, String)>,
        arch: Arch,
        cpus: u32,
        memory: u64,
    ) {
        let uid = self.clients.new_uid();
        let client = Client::new(uid, netid, engines.clone(), arch, cpus, memory);
        let strid = client.strid();
        log::info!(
            "[{strid}] [HELLO] Arch:{arch} engines:{:?} (cpu:{cpus}, mem:{memory})",
            engines.iter().map(|(e, _)| *e).collect::<Vec<_>>()
        );
        self.clients.insert(client);

        if self.state != CampaignState::Running {
            return;
        }
        // A client arriving in the middle of a running campaign.
        self.start_client(transport, netid);

        if self.policy == BrokingPolicy::Full {
            let seeds: Vec<(Vec<u8>, SeedType, FuzzingEngine)> = self
                .seed_pool
                .iter()
                .map(|(bytes, info)| (bytes.to_vec(), info.seed_type, info.origin))
                .collect();
            for (bytes, seed_type, origin) in seeds {
                if let Err(e) = transport.send_seed(netid, seed_type, &bytes, origin) {
                    log::error!("failed to replay seed to {netid}: {e}");
                    continue;
                }
                if let Some(client) = self.clients.get_mut(netid) {
                    client.add_seed(&bytes);
                }
            }
        }
    }

    /// `SEED(type, bytes, origin)`.
    pub fn handle_seed(
        &mut self,
        transport: &mut dyn Transport,
        netid: ClientNetId,
        seed_type: SeedType,
        bytes: &[u8],
        origin: FuzzingEngine,
    ) {
        let Some(client) = self.clients.get(netid) else {
            self.warn_unknown(transport, netid);
            return;
        };
        let strid = client.strid();

        let submission = self.seed_pool.submit(bytes, seed_type, origin);
        self.stats
            .update_seed_stat(netid, seed_type, submission == Submission::New);

        if submission == Submission::New {
            log::info!(
                "[{strid}] [SEED] [{origin}] {:x} ({seed_type:?})",
                md5::compute(bytes)
            );
            if let Err(e) = self.workspace.write_seed(seed_type, &strid, bytes) {
                log::error!("failed to persist seed from {strid}: {e}");
            }
        }

        if submission != Submission::New {
            return;
        }

        let Some(origin_client) = self.clients.get(netid) else {
            return;
        };
        let targets: Vec<ClientNetId> = self
            .clients
            .iter_others(netid)
            .filter(|peer| peer.is_new_seed(bytes) && self.policy.should_forward(origin_client, peer))
            .map(|peer| peer.netid)
            .collect();
        for target in targets {
            if let Err(e) = transport.send_seed(target, seed_type, bytes, origin) {
                log::error!("failed to forward seed to {target}: {e}");
                continue;
            }
            if let Some(peer) = self.clients.get_mut(target) {
                peer.add_seed(bytes);
            }
        }
    }

    /// `LOG(level, message)`: forwarded verbatim to the client's log sink.
    pub fn handle_log(&mut self, transport: &mut dyn Transport, netid: ClientNetId, level: LogLevel, message: &str) {
        let Some(client) = self.clients.get_mut(netid) else {
            self.warn_unknown(transport, netid);
            return;
        };
        client.log(level, message);
    }

    /// `TELEMETRY(...)`: every non-null field is recorded; `state` is
    /// received and ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_telemetry(
        &mut self,
        transport: &mut dyn Transport,
        netid: ClientNetId,
        _state: Option<State>,
        exec_per_sec: Option<u64>,
        total_exec: Option<u64>,
        cycle: Option<u64>,
        timeout: Option<u64>,
        coverage_block: Option<u64>,
        coverage_edge: Option<u64>,
        coverage_path: Option<u64>,
        last_cov_update: Option<u64>,
    ) {
        if self.clients.get(netid).is_none() {
            self.warn_unknown(transport, netid);
            return;
        }

        let line = format!(
            "exec/s:{} tot_exec:{} cycle:{} To:{} CovB:{} CovE:{} CovP:{} last_up:{}",
            render_field(exec_per_sec),
            render_field(total_exec),
            render_field(cycle),
            render_field(timeout),
            render_field(coverage_block),
            render_field(coverage_edge),
            render_field(coverage_path),
            render_field(last_cov_update),
        );
        if let Some(client) = self.clients.get_mut(netid) {
            client.log(LogLevel::Info, &line);
        }

        self.stats.set_exec_per_sec(netid, exec_per_sec);
        self.stats.set_total_exec(netid, total_exec);
        self.stats.set_cycle(netid, cycle);
        self.stats.set_timeout(netid, timeout);
        self.stats.set_coverage_block(netid, coverage_block);
        self.stats.set_coverage_edge(netid, coverage_edge);
        self.stats.set_coverage_path(netid, coverage_path);
        self.stats.set_last_coverage_update(netid, last_cov_update);
    }

    /// `STOP_COVERAGE()`: exactly-one-stops-all. Also begins the campaign's
    /// STOPPING transition, which a STOP_COVERAGE from any client triggers.
    pub fn handle_stop_coverage(&mut self, transport: &mut dyn Transport, netid: ClientNetId) {
        let Some(client) = self.clients.get(netid) else {
            self.warn_unknown(transport, netid);
            return;
        };
        log::info!("[{}] [STOP_COVERAGE]", client.strid());

        if self.state == CampaignState::Running {
            self.state = CampaignState::Stopping;
        }

        let others: Vec<ClientNetId> = self.clients.iter_others(netid).map(|c| c.netid).collect();
        for other in others {
            if let Some(c) = self.clients.get_mut(other) {
                c.set_stopped();
            }
            let _ = transport.send_stop(other);
        }
    }

    /// `DATA(id, covered, validated)`: resolves the alert via binding-id or
    /// raw-id, applies the monotone update, and terminates the campaign
    /// once every alert is validated.
    pub fn handle_data(&mut self, transport: &mut dyn Transport, netid: ClientNetId, id: &str, covered: bool, validated: bool) {
        let Some(client) = self.clients.get(netid) else {
            self.warn_unknown(transport, netid);
            return;
        };
        let strid = client.strid();

        let Some(index) = self.defect_report.resolve(id) else {
            log::warn!("[{strid}] [DATA] unknown alert id '{id}'");
            return;
        };

        let (newly_covered, newly_validated) = self.defect_report.apply_update(index, covered, validated);
        if newly_covered {
            log::info!("[{strid}] is the first to cover alert '{id}'");
        }
        if newly_validated {
            log::info!("[{strid}] is the first to validate alert '{id}'");
        }
        if newly_covered || newly_validated {
            if let Err(e) = self.defect_report.write_csv(&self.workspace.csv_path()) {
                log::error!("failed to write {}: {e}", self.workspace.csv_path().display());
            }
        }

        if self.defect_report.all_alerts_validated() {
            self.stop_broker(transport);
        }
    }

    /// Explicit operator stop, or the all-validated path out of
    /// [`handle_data`]: STOPPING -> TERMINATED, `STOP` to every connected
    /// client, final CSV write.
    pub fn stop_broker(&mut self, transport: &mut dyn Transport) {
        let netids: Vec<(ClientNetId, String)> = self.clients.iter().map(|c| (c.netid, c.strid())).collect();
        for (netid, strid) in netids {
            log::info!("send stop to {strid}");
            let _ = transport.send_stop(netid);
        }
        self.state = CampaignState::Terminated;
        if let Err(e) = self.defect_report.write_csv(&self.workspace.csv_path()) {
            log::error!("failed to write final {}: {e}", self.workspace.csv_path().display());
        }
    }
}
