//! Per-endpoint session state machine. Each of the three endpoints runs its
//! own actor; the only runtime interaction between them flows through the
//! public channel (and, during collection, through the air).

use crate::amplify::amplify;
use crate::cascade::Cascade;
use crate::csi::Aggregator;
use crate::medium::PublicChannel;
use crate::message::PublicMessage;
use crate::quantizer::quantize;
use crate::queue::Inbox;
use crate::radio::{CaptureSource, RadioControl};
use crate::report::EndpointReport;
use crate::secure::{receive_probe, send_probe};
use crate::session::SessionParams;
use crate::support::{PlkgError, PlkgResult, Role};
use aether::logging;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    Setup,
    Sync,
    CollectForward,
    CollectReverse,
    Quantize,
    Reconcile,
    Amplify,
    Test,
    Done,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Sync => "sync",
            Stage::CollectForward => "collect_forward",
            Stage::CollectReverse => "collect_reverse",
            Stage::Quantize => "quantize",
            Stage::Reconcile => "reconcile",
            Stage::Amplify => "amplify",
            Stage::Test => "test",
            Stage::Done => "done",
        }
    }
}

/// One endpoint's session driver. Owns the endpoint state; the radio and
/// channel stay behind their traits so the same actor runs over serial
/// hardware or fully in-process.
pub struct Actor {
    role: Role,
    params: SessionParams,
    aggregator: Arc<Mutex<Aggregator>>,
    inbox: Arc<Inbox>,
    channel: Arc<dyn PublicChannel>,
    radio: Arc<dyn RadioControl>,
    log: logging::Logger,
}

impl Actor {
    pub fn new<'a, L: Into<Option<&'a logging::Logger>>>(
        role: Role,
        params: SessionParams,
        aggregator: Arc<Mutex<Aggregator>>,
        inbox: Arc<Inbox>,
        channel: Arc<dyn PublicChannel>,
        radio: Arc<dyn RadioControl>,
        log: L,
    ) -> Actor {
        let log = match log.into() {
            Some(log) => log.new(logging::o!("role" => role.name())),
            _ => logging::null(),
        };

        Actor { role, params, aggregator, inbox, channel, radio, log }
    }

    /// Drives the session to completion. A fatal stage error short-circuits
    /// to `done` with the failure recorded; everything gathered up to that
    /// point stays in the report.
    pub fn run(self) -> EndpointReport {
        let mut report = EndpointReport::new(self.role);

        match self.drive(&mut report) {
            Ok(()) => (),
            Err(PlkgError::Fatal(kind)) => {
                logging::error!(self.log, "session failed"; "error" => %kind);
                report.failure = Some(kind);
            }
            Err(PlkgError::Timeout) => {
                logging::warn!(self.log, "session timed out mid-stage");
            }
        }

        self.enter(Stage::Done);

        report
    }

    fn drive(&self, report: &mut EndpointReport) -> PlkgResult<()> {
        self.enter(Stage::Setup);
        self.radio.setup()?;
        thread::sleep(self.params.settle());

        if self.params.sync {
            self.enter(Stage::Sync);
            self.synchronize();
        }

        self.enter(Stage::CollectForward);
        match self.role {
            Role::Initiator => self.radio.start_ping(self.params.phase())?,
            _ => self.radio.start_capture(self.params.phase(), CaptureSource::Initiator)?,
        }
        thread::sleep(self.params.phase() + self.params.settle());

        self.enter(Stage::CollectReverse);
        match self.role {
            Role::Responder => self.radio.start_ping(self.params.phase())?,
            _ => self.radio.start_capture(self.params.phase(), CaptureSource::Responder)?,
        }
        thread::sleep(self.params.phase() + self.params.settle());

        self.enter(Stage::Quantize);
        let profile = {
            let aggregator = self.aggregator.lock().expect("Aggregator lock poisoned");
            report.packets = aggregator.received();
            aggregator.mean_profile(&self.params.valid_ranges)?
        };

        let raw = quantize(&profile, self.params.k_main, self.params.m_neighbors)?;
        logging::info!(self.log, "raw key derived";
                       "packets" => report.packets,
                       "bits" => raw.len(),
                       "key" => raw.hex());
        report.raw = Some(raw.clone());

        self.enter(Stage::Reconcile);
        let cascade = Cascade::new(
            &self.params.cascade,
            &self.inbox,
            self.channel.as_ref(),
            &self.log,
        );

        let reconciled = match self.role {
            Role::Initiator => {
                cascade.run_initiator(&raw)?;
                raw.clone()
            }
            Role::Responder => {
                let mut bits = raw.clone();
                report.corrections = cascade.run_responder(&mut bits)?;
                bits
            }
            Role::Eavesdropper => {
                report.observation = Some(cascade.run_eavesdropper());
                raw.clone()
            }
        };

        logging::info!(self.log, "reconciliation complete";
                       "corrections" => report.corrections,
                       "key" => reconciled.hex());
        report.reconciled = Some(reconciled.clone());

        self.enter(Stage::Amplify);
        let final_key = amplify(&reconciled);
        report.final_key = Some(final_key);

        self.enter(Stage::Test);
        let outcome = match self.role {
            Role::Initiator => {
                // Give the receivers a beat to reach their wait.
                thread::sleep(self.params.settle());
                send_probe(
                    self.channel.as_ref(),
                    &final_key,
                    self.params.probe_plaintext.as_bytes(),
                )?
            }
            _ => receive_probe(&self.inbox, &final_key, self.params.secure_timeout()),
        };

        logging::info!(self.log, "secure channel verdict"; "outcome" => ?outcome);
        report.outcome = Some(outcome);

        Ok(())
    }

    /// Check/go barrier so no endpoint starts pinging before the others
    /// listen. Best effort: a timeout degrades to proceeding with a warning.
    fn synchronize(&self) {
        let deadline = Instant::now() + self.params.sync_timeout();

        match self.role {
            Role::Initiator => {
                self.inbox.clear();

                while Instant::now() < deadline {
                    if self.channel.publish(&PublicMessage::SyncCheck).is_err() {
                        break;
                    }

                    let echo = self.inbox.take(
                        Instant::now() + Duration::from_millis(500),
                        |m| matches!(m, PublicMessage::SyncCheck),
                    );

                    if echo.is_some() {
                        drop(self.channel.publish(&PublicMessage::SyncGo));
                        logging::debug!(self.log, "peers aligned"; "context" => "sync");
                        return;
                    }
                }
            }
            Role::Responder => {
                while let Some(message) = self.inbox.take(deadline, |m| {
                    matches!(m, PublicMessage::SyncCheck | PublicMessage::SyncGo)
                }) {
                    match message {
                        PublicMessage::SyncCheck => {
                            drop(self.channel.publish(&PublicMessage::SyncCheck));
                        }
                        _ => {
                            self.inbox.clear();
                            logging::debug!(self.log, "barrier released"; "context" => "sync");
                            return;
                        }
                    }
                }
            }
            Role::Eavesdropper => {
                self.inbox
                    .take(deadline, |m| matches!(m, PublicMessage::SyncGo));
                self.inbox.clear();
                return;
            }
        }

        logging::warn!(self.log, "barrier never completed, proceeding"; "context" => "sync");
    }

    #[inline]
    fn enter(&self, stage: Stage) {
        logging::info!(self.log, "stage"; "stage" => stage.name());
    }
}
