//! Client registry: per-connected-client state.

use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};

use crate::error::Error;
use crate::types::{Arch, CheckMode, CoverageMode, ExecMode, FuzzingEngine, LogLevel};

/// Opaque transport-level client identifier.
///
/// The wire transport assigns and owns these; the broker only ever treats
/// them as an equality key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientNetId(pub u64);

impl Display for ClientNetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four-tuple a client is assigned by the Assignment Engine. A client
/// is either unassigned or holds a complete four-tuple assignment, never
/// something in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub engine: FuzzingEngine,
    pub coverage_mode: CoverageMode,
    pub exec_mode: ExecMode,
    pub check_mode: CheckMode,
}

/// A sink that writes a client's forwarded `LOG` messages somewhere durable.
///
/// One file per client under `<workspace>/logs/`, plus a mirrored
/// `log::info!` so the broker's own stdout/`broker.log` sees it too.
#[derive(Debug)]
pub struct ClientLogSink {
    file: File,
}

impl ClientLogSink {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log(&mut self, strid: &str, level: LogLevel, message: &str) {
        log::info!("[{strid}] [{level:?}] {message}");
        let _ = writeln!(self.file, "[{level:?}] {message}");
    }
}

/// Per-connected-client state.
#[derive(Debug)]
pub struct Client {
    /// Monotonic broker-local id, used to build [`Client::strid`].
    pub id: u64,
    /// Opaque transport id.
    pub netid: ClientNetId,
    /// Engines (with version strings) the client advertised at `HELLO`.
    pub engines: Vec<(FuzzingEngine, String)>,
    pub arch: Arch,
    pub cpus: u32,
    pub memory: u64,
    running: bool,
    stopped: bool,
    assignment: Option<Assignment>,
    seeds_sent: HashSet<Vec<u8>>,
    log_sink: Option<ClientLogSink>,
}

impl Client {
    pub fn new(
        id: u64,
        netid: ClientNetId,
        engines: Vec<(FuzzingEngine, String)>,
        arch: Arch,
        cpus: u32,
        memory: u64,
    ) -> Self {
        Self {
            id,
            netid,
            engines,
            arch,
            cpus,
            memory,
            running: false,
            stopped: false,
            assignment: None,
            seeds_sent: HashSet::new(),
            log_sink: None,
        }
    }

    /// `Cli-<N>-<capabilities>`, e.g. `Cli-0-TTHF`.
    pub fn strid(&self) -> String {
        let caps: String = self.engines.iter().map(|(e, _)| e.tag()).collect();
        format!("Cli-{}-{caps}", self.id)
    }

    pub fn is_supported_engine(&self, engine: FuzzingEngine) -> bool {
        self.engines.iter().any(|(e, _)| *e == engine)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.assignment
    }

    pub fn set_running(&mut self, assignment: Assignment) {
        self.assignment = Some(assignment);
        self.running = true;
    }

    pub fn set_stopped(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_new_seed(&self, seed: &[u8]) -> bool {
        !self.seeds_sent.contains(seed)
    }

    pub fn add_seed(&mut self, seed: &[u8]) {
        self.seeds_sent.insert(seed.to_vec());
    }

    pub fn attach_log_sink(&mut self, sink: ClientLogSink) {
        self.log_sink = Some(sink);
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let strid = self.strid();
        if let Some(sink) = self.log_sink.as_mut() {
            sink.log(&strid, level, message);
        } else {
            log::info!("[{strid}] [{level:?}] {message}");
        }
    }
}

/// Registry of all connected clients, keyed by transport id.
///
/// Kept as its own type (rather than a bare map on `Broker`) so the
/// assignment-spread invariant ("N(e) = number of running clients on engine
/// e") can be computed without reaching into broker internals.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientNetId, Client>,
    next_id: u64,
    log_dir: Option<PathBuf>,
}

impl ClientRegistry {
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 0,
            log_dir,
        }
    }

    /// Allocate a new monotonic uid.
    pub fn new_uid(&mut self) -> u64 {
        let v = self.next_id;
        self.next_id += 1;
        v
    }

    pub fn insert(&mut self, mut client: Client) -> &mut Client {
        if let Some(dir) = &self.log_dir {
            let path = dir.join(format!("{}.log", client.strid()));
            if let Ok(sink) = ClientLogSink::open(&path) {
                client.attach_log_sink(sink);
            }
        }
        let netid = client.netid;
        self.clients.insert(netid, client);
        self.clients.get_mut(&netid).expect("just inserted")
    }

    pub fn get(&self, netid: ClientNetId) -> Option<&Client> {
        self.clients.get(&netid)
    }

    pub fn get_mut(&mut self, netid: ClientNetId) -> Option<&mut Client> {
        self.clients.get_mut(&netid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }

    /// All clients but the one identified by `netid`.
    pub fn iter_others(&self, netid: ClientNetId) -> impl Iterator<Item = &Client> {
        self.clients.values().filter(move |c| c.netid != netid)
    }

    pub fn iter_others_mut(&mut self, netid: ClientNetId) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut().filter(move |c| c.netid != netid)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strid_embeds_capabilities_in_declared_order() {
        let client = Client::new(
            3,
            ClientNetId(1),
            vec![
                (FuzzingEngine::Triton, "1.0".into()),
                (FuzzingEngine::Honggfuzz, "2.0".into()),
            ],
            Arch::X86_64,
            4,
            1024,
        );
        assert_eq!(client.strid(), "Cli-3-TTHF");
    }

    #[test]
    fn seeds_sent_is_monotonically_growing() {
        let mut client = Client::new(0, ClientNetId(0), vec![], Arch::X86_64, 1, 1);
        assert!(client.is_new_seed(b"abc"));
        client.add_seed(b"abc");
        assert!(!client.is_new_seed(b"abc"));
    }

    #[test]
    fn registry_iter_others_excludes_self() {
        let mut reg = ClientRegistry::new(None);
        reg.insert(Client::new(0, ClientNetId(1), vec![], Arch::X86_64, 1, 1));
        reg.insert(Client::new(1, ClientNetId(2), vec![], Arch::X86_64, 1, 1));
        let others: Vec<_> = reg.iter_others(ClientNetId(1)).map(|c| c.netid).collect();
        assert_eq!(others, vec![ClientNetId(2)]);
    }
}
