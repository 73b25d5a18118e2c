//! Binary entry point: parses the CLI, builds a [`Broker`], and drives its
//! startup sequence.
//!
//! No wire transport ships with this crate, so this binary cannot yet
//! accept real client connections; it exists to exercise workspace/registry
//! loading end-to-end and to start already-idle clients reloaded from a
//! prior run. Wiring a concrete `Transport` (and the message-dispatch loop
//! that calls `Broker::handle_*`) is left as a TODO, see DESIGN.md.

use clap::Parser;
use pastis_broker::broker::Broker;
use pastis_broker::cli::Cli;
use pastis_broker::transport::LoggingTransport;
use pastis_broker::Error;

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let config = cli.into_broker_config();

    pastis_broker::logging::init(&config.workspace)?;

    let mut broker = Broker::new(config)?;

    let mut transport = LoggingTransport;
    broker.start(&mut transport);

    log::info!(
        "broker configured: {} clients, {} seeds loaded, defect report has {} alerts",
        broker.clients().len(),
        broker.seed_pool().len(),
        broker.defect_report().len()
    );
    Ok(())
}
