//! Interactive Cascade reconciliation: the initiator publishes block
//! parities per permuted pass, the responder locates and flips errant bits
//! through parity binary searches, the eavesdropper watches.

pub mod permutation;

use crate::key::BitKey;
use crate::medium::PublicChannel;
use crate::message::PublicMessage;
use crate::queue::Inbox;
use crate::support::PlkgResult;
use aether::logging;
use serde_derive::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use self::permutation::{block_size, blocks, permutation as pass_permutation};

/// Shared parameters of a reconciliation session. Both endpoints must run
/// the same passes and initial block size or their block partitions diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub passes: u32,
    pub initial_block: usize,
    pub init_timeout_ms: u64,
    pub response_timeout_ms: u64,
}

impl Default for CascadeConfig {
    fn default() -> CascadeConfig {
        CascadeConfig {
            passes: 8,
            initial_block: 4,
            init_timeout_ms: 8000,
            response_timeout_ms: 3000,
        }
    }
}

impl CascadeConfig {
    #[inline]
    fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    #[inline]
    fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// What a passive observer learned from the public traffic.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Observation {
    pub inits_seen: u32,
    pub parities_seen: usize,
    pub requests_seen: usize,
    pub responses_seen: usize,
}

/// One endpoint's view of a reconciliation session. The same driver serves
/// all three roles; which entry point runs is decided by the orchestrator.
pub struct Cascade<'a> {
    config: &'a CascadeConfig,
    inbox: &'a Inbox,
    channel: &'a dyn PublicChannel,
    log: logging::Logger,
}

impl<'a> Cascade<'a> {
    pub fn new<'b, L: Into<Option<&'b logging::Logger>>>(
        config: &'a CascadeConfig,
        inbox: &'a Inbox,
        channel: &'a dyn PublicChannel,
        log: L,
    ) -> Cascade<'a> {
        let log = match log.into() {
            Some(log) => log.new(logging::o!()),
            _ => logging::null(),
        };

        Cascade { config, inbox, channel, log }
    }

    /// Reference-key side. Publishes block parities for every pass and
    /// answers window parity requests until the responder signals the pass
    /// done (or the pass goes quiet). The reference bits never change.
    pub fn run_initiator(&self, key: &BitKey) -> PlkgResult<()> {
        for pass in 0..self.config.passes {
            let perm = pass_permutation(pass, key.len());
            let size = block_size(pass, self.config.initial_block);

            let parities: Vec<u8> = blocks(key.len(), size)
                .iter()
                .map(|&(start, length)| key.parity(&perm[start..start + length]))
                .collect();

            logging::debug!(self.log, "publishing pass parities";
                            "context" => "initiator",
                            "pass" => pass,
                            "block_size" => size,
                            "blocks" => parities.len());

            self.channel
                .publish(&PublicMessage::CascadeInit { pass, parities })?;

            loop {
                let deadline = Instant::now() + self.config.init_timeout();
                let message = self.inbox.take(deadline, |m| {
                    m.pass() == Some(pass)
                        && matches!(
                            m,
                            PublicMessage::CascadeRequest { .. } | PublicMessage::CascadeDone { .. }
                        )
                });

                match message {
                    Some(PublicMessage::CascadeRequest { start, length, .. }) => {
                        let end = (start + length).min(key.len());

                        if start >= end {
                            continue;
                        }

                        let parity = key.parity(&perm[start..end]);
                        self.channel
                            .publish(&PublicMessage::CascadeResponse { pass, start, parity })?;
                    }
                    Some(PublicMessage::CascadeDone { .. }) => break,
                    Some(_) => unreachable!("predicate admits only requests and done"),
                    None => {
                        logging::warn!(self.log, "pass went quiet, advancing";
                                       "context" => "initiator",
                                       "pass" => pass);
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Noisy-key side. Per pass: learn the initiator's block parities,
    /// binary-search every mismatching block for its errant bit, flip it,
    /// and signal the pass done. Returns the number of corrected bits.
    pub fn run_responder(&self, key: &mut BitKey) -> PlkgResult<usize> {
        let mut corrections = 0;

        for pass in 0..self.config.passes {
            let deadline = Instant::now() + self.config.init_timeout();
            let init = self.inbox.take(deadline, |m| {
                m.pass() == Some(pass) && matches!(m, PublicMessage::CascadeInit { .. })
            });

            let parities = match init {
                Some(PublicMessage::CascadeInit { parities, .. }) => parities,
                _ => {
                    // A missed INIT yields a zero-correction pass.
                    logging::warn!(self.log, "pass parities never arrived";
                                   "context" => "responder",
                                   "pass" => pass);
                    self.channel.publish(&PublicMessage::CascadeDone { pass })?;
                    continue;
                }
            };

            let perm = pass_permutation(pass, key.len());
            let size = block_size(pass, self.config.initial_block);
            let partition = blocks(key.len(), size);

            let mut pass_corrections = 0;

            // Trailing blocks with no published parity are left alone.
            for (block, &(start, length)) in partition.iter().enumerate().take(parities.len()) {
                let local = key.parity(&perm[start..start + length]);

                if local == parities[block] {
                    continue;
                }

                // Parity disagreement means an odd number of errors in the
                // window; the search narrows down to exactly one of them.
                if let Some(errant) = self.search(pass, &perm, start, length, key)? {
                    key.flip(errant);
                    corrections += 1;
                    pass_corrections += 1;
                }
            }

            logging::debug!(self.log, "pass complete";
                            "context" => "responder",
                            "pass" => pass,
                            "corrections" => pass_corrections);

            self.channel.publish(&PublicMessage::CascadeDone { pass })?;
        }

        Ok(corrections)
    }

    /// Interactive binary search over a permuted window whose parity
    /// disagrees with the initiator's. Returns the original index of the bit
    /// to flip, or `None` when a response deadline expired (the block then
    /// keeps its undiagnosed error).
    fn search(
        &self,
        pass: u32,
        perm: &[usize],
        mut offset: usize,
        mut length: usize,
        key: &BitKey,
    ) -> PlkgResult<Option<usize>> {
        while length > 1 {
            let left = length / 2;
            let local = key.parity(&perm[offset..offset + left]);

            self.channel
                .publish(&PublicMessage::CascadeRequest { pass, start: offset, length: left })?;

            let deadline = Instant::now() + self.config.response_timeout();
            let reply = self.inbox.take(deadline, |m| match m {
                PublicMessage::CascadeResponse { pass: p, start, .. } => {
                    *p == pass && *start == offset
                }
                _ => false,
            });

            let remote = match reply {
                Some(PublicMessage::CascadeResponse { parity, .. }) => parity,
                _ => {
                    logging::warn!(self.log, "parity response timed out, aborting search";
                                   "context" => "responder",
                                   "pass" => pass,
                                   "window_start" => offset,
                                   "window_length" => length);
                    return Ok(None);
                }
            };

            if local != remote {
                length = left;
            } else {
                offset += left;
                length -= left;
            }
        }

        Ok(Some(perm[offset]))
    }

    /// Passive side. Observes the pass traffic without ever transmitting or
    /// touching its own bits; the tally feeds the leakage report.
    pub fn run_eavesdropper(&self) -> Observation {
        let mut observation = Observation::default();

        for pass in 0..self.config.passes {
            let deadline = Instant::now() + self.config.init_timeout();
            let init = self.inbox.take(deadline, |m| {
                m.pass() == Some(pass) && matches!(m, PublicMessage::CascadeInit { .. })
            });

            if let Some(PublicMessage::CascadeInit { parities, .. }) = init {
                observation.inits_seen += 1;
                observation.parities_seen += parities.len();
            }

            loop {
                let deadline = Instant::now() + self.config.response_timeout();
                let message = self.inbox.take(deadline, |m| {
                    m.pass() == Some(pass)
                        && matches!(
                            m,
                            PublicMessage::CascadeRequest { .. }
                                | PublicMessage::CascadeResponse { .. }
                                | PublicMessage::CascadeDone { .. }
                        )
                });

                match message {
                    Some(PublicMessage::CascadeRequest { .. }) => observation.requests_seen += 1,
                    Some(PublicMessage::CascadeResponse { .. }) => observation.responses_seen += 1,
                    Some(PublicMessage::CascadeDone { .. }) | None => break,
                    Some(_) => unreachable!("predicate admits only pass traffic"),
                }
            }
        }

        logging::debug!(self.log, "observation complete";
                        "context" => "eavesdropper",
                        "inits" => observation.inits_seen,
                        "requests" => observation.requests_seen,
                        "responses" => observation.responses_seen);

        observation
    }
}
