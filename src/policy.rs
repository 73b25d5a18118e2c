//! Broking Policies: the rule by which newly discovered seeds are shared
//! among connected clients. Fixed at broker startup.

use crate::client::Client;

/// The rule a [`Broker`](crate::broker::Broker) applies when deciding which
/// peers to re-send a newly-discovered seed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokingPolicy {
    /// Every new seed is sent to every other client that hasn't seen it.
    Full,
    /// Seeds are persisted and counted but never re-broadcast; used for
    /// head-to-head engine comparison.
    NoTransmit,
    /// A new seed is sent to a peer only if that peer shares a coverage
    /// notion with the discovering client. Interface reserved; behavior
    /// otherwise matches `Full` filtered by coverage-mode equality.
    CoverageOrdered,
}

impl BrokingPolicy {
    /// Whether `origin`'s new seed should be forwarded to `peer` under this
    /// policy.
    ///
    /// `COVERAGE_ORDERED`'s exact matching rule was left open (see
    /// DESIGN.md); this takes the literal "filtered by coverage-mode
    /// equality" reading: both clients must be running and share the same
    /// `coverage_mode`.
    pub fn should_forward(self, origin: &Client, peer: &Client) -> bool {
        match self {
            BrokingPolicy::Full => true,
            BrokingPolicy::NoTransmit => false,
            BrokingPolicy::CoverageOrdered => {
                match (origin.assignment(), peer.assignment()) {
                    (Some(a), Some(b)) => a.coverage_mode == b.coverage_mode,
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Assignment, ClientNetId};
    use crate::types::{Arch, CheckMode, CoverageMode, ExecMode, FuzzingEngine};

    fn client_with_assignment(coverage_mode: Option<CoverageMode>) -> Client {
        let mut c = Client::new(0, ClientNetId(0), vec![], Arch::X86_64, 1, 1);
        if let Some(coverage_mode) = coverage_mode {
            c.set_running(Assignment {
                engine: FuzzingEngine::Triton,
                coverage_mode,
                exec_mode: ExecMode::SingleExec,
                check_mode: CheckMode::CheckAll,
            });
        }
        c
    }

    #[test]
    fn full_always_forwards() {
        let a = client_with_assignment(None);
        let b = client_with_assignment(None);
        assert!(BrokingPolicy::Full.should_forward(&a, &b));
    }

    #[test]
    fn no_transmit_never_forwards() {
        let a = client_with_assignment(Some(CoverageMode::Block));
        let b = client_with_assignment(Some(CoverageMode::Block));
        assert!(!BrokingPolicy::NoTransmit.should_forward(&a, &b));
    }

    #[test]
    fn coverage_ordered_requires_matching_coverage_mode() {
        let a = client_with_assignment(Some(CoverageMode::Block));
        let b = client_with_assignment(Some(CoverageMode::Edge));
        assert!(!BrokingPolicy::CoverageOrdered.should_forward(&a, &b));
        let c = client_with_assignment(Some(CoverageMode::Block));
        assert!(BrokingPolicy::CoverageOrdered.should_forward(&a, &c));
    }
}
