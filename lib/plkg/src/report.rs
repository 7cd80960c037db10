use crate::cascade::Observation;
use crate::key::BitKey;
use crate::secure::SecureOutcome;
use crate::support::{ErrorKind, Role};
use std::fmt::Write;

/// What one endpoint has to show for the session.
#[derive(Debug, Clone)]
pub struct EndpointReport {
    pub role: Role,
    pub packets: usize,
    pub raw: Option<BitKey>,
    pub reconciled: Option<BitKey>,
    pub corrections: usize,
    pub observation: Option<Observation>,
    pub final_key: Option<[u8; 32]>,
    pub outcome: Option<SecureOutcome>,
    pub failure: Option<ErrorKind>,
}

impl EndpointReport {
    pub fn new(role: Role) -> EndpointReport {
        EndpointReport {
            role,
            packets: 0,
            raw: None,
            reconciled: None,
            corrections: 0,
            observation: None,
            final_key: None,
            outcome: None,
            failure: None,
        }
    }
}

/// The combined, user-visible session summary.
#[derive(Debug)]
pub struct SessionReport {
    pub initiator: EndpointReport,
    pub responder: EndpointReport,
    pub eavesdropper: EndpointReport,
}

impl SessionReport {
    /// Bit mismatches between two endpoints' keys, raw and reconciled.
    fn mismatches(a: &EndpointReport, b: &EndpointReport) -> (Option<usize>, Option<usize>) {
        let raw = match (&a.raw, &b.raw) {
            (Some(x), Some(y)) => Some(x.mismatches(y)),
            _ => None,
        };
        let reconciled = match (&a.reconciled, &b.reconciled) {
            (Some(x), Some(y)) => Some(x.mismatches(y)),
            _ => None,
        };

        (raw, reconciled)
    }

    /// True when the responder recovered the probe plaintext byte-exact.
    pub fn round_trip_succeeded(&self) -> bool {
        matches!(self.responder.outcome, Some(SecureOutcome::Recovered(_)))
    }

    /// Process exit code: 0 for a positive round trip, 1 for a dead or
    /// unconfigurable radio, 2 for insufficient CSI or a failed round trip.
    pub fn exit_code(&self) -> i32 {
        let endpoints = [&self.initiator, &self.responder, &self.eavesdropper];

        if endpoints
            .iter()
            .any(|e| matches!(e.failure, Some(ErrorKind::SerialUnavailable(_))))
        {
            return 1;
        }

        if self.round_trip_succeeded() {
            0
        } else {
            2
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        writeln!(out, "=== key generation session ===").unwrap();

        for endpoint in &[&self.initiator, &self.responder, &self.eavesdropper] {
            let raw = endpoint
                .raw
                .as_ref()
                .map(|k| k.hex())
                .unwrap_or_else(|| "-".to_string());
            let reconciled = endpoint
                .reconciled
                .as_ref()
                .map(|k| k.hex())
                .unwrap_or_else(|| "-".to_string());

            writeln!(
                out,
                "{:<13} packets {:<5} raw {:<10} reconciled {:<10} corrections {}",
                endpoint.role, endpoint.packets, raw, reconciled, endpoint.corrections
            )
            .unwrap();

            if let Some(failure) = endpoint.failure {
                writeln!(out, "{:<13} failed: {}", endpoint.role, failure).unwrap();
            }
        }

        let (raw_ab, rec_ab) = Self::mismatches(&self.initiator, &self.responder);
        let (raw_ae, rec_ae) = Self::mismatches(&self.initiator, &self.eavesdropper);

        writeln!(
            out,
            "initiator/responder mismatches:    raw {} reconciled {}",
            fmt_count(raw_ab),
            fmt_count(rec_ab)
        )
        .unwrap();
        writeln!(
            out,
            "initiator/eavesdropper mismatches: raw {} reconciled {}",
            fmt_count(raw_ae),
            fmt_count(rec_ae)
        )
        .unwrap();

        if let Some(observation) = &self.eavesdropper.observation {
            writeln!(
                out,
                "eavesdropper observed: {} parity sets, {} parities, {} searches answered",
                observation.inits_seen, observation.parities_seen, observation.responses_seen
            )
            .unwrap();
        }

        writeln!(
            out,
            "secure round trip: responder {}, eavesdropper {}",
            fmt_outcome(&self.responder.outcome),
            fmt_outcome(&self.eavesdropper.outcome)
        )
        .unwrap();

        out
    }
}

fn fmt_count(count: Option<usize>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

fn fmt_outcome(outcome: &Option<SecureOutcome>) -> &'static str {
    match outcome {
        Some(SecureOutcome::Sent) => "sent",
        Some(SecureOutcome::Recovered(_)) => "recovered",
        Some(SecureOutcome::Rejected) => "rejected",
        Some(SecureOutcome::Missing) => "missing",
        None => "-",
    }
}
