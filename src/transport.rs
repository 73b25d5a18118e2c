//! The `Transport` seam: the wire transport is an external collaborator,
//! so this crate only defines the boundary the Broker Core drives it
//! through.
//!
//! A concrete transport is expected to hold one typed handler slot per
//! message kind, dispatching inbound wire messages into
//! [`Broker`](crate::broker::Broker)'s handler methods and implementing
//! this trait for the outbound message kinds. No concrete network
//! transport ships in this crate; `MockTransport` below exists purely for
//! tests.

use crate::client::ClientNetId;
use crate::error::Error;
use crate::types::{CheckMode, CoverageMode, ExecMode, FuzzingEngine, SeedInjectLoc, SeedType};
use std::path::PathBuf;

/// Outbound `START(program, argv, exec-mode, check-mode, cov-mode, engine,
/// engine-args, inject-loc, defect-report-json)` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StartMessage {
    pub program: PathBuf,
    pub argv: Vec<String>,
    pub exec_mode: ExecMode,
    pub check_mode: CheckMode,
    pub coverage_mode: CoverageMode,
    pub engine: FuzzingEngine,
    pub engine_args: String,
    pub inject_loc: SeedInjectLoc,
    pub defect_report_json: String,
}

/// Everything the Broker Core can ask the transport to deliver to a client.
///
/// Modeled on `libafl_bolts`' `EventManager::fire`-style outbound seam: a
/// small, closed set of methods rather than a generic `send(Event)`, so each
/// wire message keeps its own typed payload.
pub trait Transport {
    fn send_start(&mut self, client: ClientNetId, msg: StartMessage) -> Result<(), Error>;

    fn send_seed(
        &mut self,
        client: ClientNetId,
        seed_type: SeedType,
        bytes: &[u8],
        origin: FuzzingEngine,
    ) -> Result<(), Error>;

    fn send_stop(&mut self, client: ClientNetId) -> Result<(), Error>;
}

/// A placeholder `Transport` that only logs what it was asked to send.
///
/// No wire protocol ships in this crate; this exists so `src/bin/broker.rs`
/// has something to drive the event loop with until a real listener is
/// wired in (see DESIGN.md's open TODO). It is not a stand-in for a
/// production transport and should not be mistaken for one.
#[derive(Debug, Default)]
pub struct LoggingTransport;

impl Transport for LoggingTransport {
    fn send_start(&mut self, client: ClientNetId, msg: StartMessage) -> Result<(), Error> {
        log::info!("[transport] START -> {client}: {} ({} {})", msg.program.display(), msg.engine, msg.coverage_mode);
        Ok(())
    }

    fn send_seed(
        &mut self,
        client: ClientNetId,
        seed_type: SeedType,
        bytes: &[u8],
        origin: FuzzingEngine,
    ) -> Result<(), Error> {
        log::info!(
            "[transport] SEED -> {client}: {:x} ({seed_type:?}, {origin})",
            md5::compute(bytes)
        );
        Ok(())
    }

    fn send_stop(&mut self, client: ClientNetId) -> Result<(), Error> {
        log::info!("[transport] STOP -> {client}");
        Ok(())
    }
}

/// Records every outbound call instead of delivering it anywhere; used by
/// this crate's own tests to exercise [`Broker`](crate::broker::Broker)
/// dispatch without a real wire transport.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockTransport {
    pub starts: Vec<(ClientNetId, StartMessage)>,
    pub seeds: Vec<(ClientNetId, SeedType, Vec<u8>, FuzzingEngine)>,
    pub stops: Vec<ClientNetId>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopped(&self, client: ClientNetId) -> bool {
        self.stops.contains(&client)
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    fn send_start(&mut self, client: ClientNetId, msg: StartMessage) -> Result<(), Error> {
        self.starts.push((client, msg));
        Ok(())
    }

    fn send_seed(
        &mut self,
        client: ClientNetId,
        seed_type: SeedType,
        bytes: &[u8],
        origin: FuzzingEngine,
    ) -> Result<(), Error> {
        self.seeds.push((client, seed_type, bytes.to_vec(), origin));
        Ok(())
    }

    fn send_stop(&mut self, client: ClientNetId) -> Result<(), Error> {
        self.stops.push(client);
        Ok(())
    }
}
