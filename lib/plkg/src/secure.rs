//! Secure-channel sanity check: the initiator seals a probe message under
//! its derived key and broadcasts it; whoever can open it holds the same
//! key. For the responder a failed open is a reconciliation failure; for the
//! eavesdropper it is the expected (and desired) outcome.

use crate::medium::PublicChannel;
use crate::message::PublicMessage;
use crate::queue::Inbox;
use crate::support::{ErrorKind, PlkgError, PlkgResult};
use aether::crypto;
use std::time::{Duration, Instant};

/// Result of one endpoint's part in the round trip.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SecureOutcome {
    /// Initiator: probe sealed and published.
    Sent,
    /// Receiver: probe opened, plaintext recovered byte-exact.
    Recovered(Vec<u8>),
    /// Receiver: tag verification failed under the local key.
    Rejected,
    /// No probe arrived before the deadline.
    Missing,
}

/// Seals the plaintext under the sender's key and publishes it.
pub fn send_probe(
    channel: &dyn PublicChannel,
    key: &[u8; crypto::KEY_SIZE],
    plaintext: &[u8],
) -> PlkgResult<SecureOutcome> {
    let sealed = crypto::seal(plaintext, key)
        .ok_or(PlkgError::Fatal(ErrorKind::DecryptionFailure))?;

    channel.publish(&PublicMessage::SecureMessage(sealed))?;

    Ok(SecureOutcome::Sent)
}

/// Awaits the probe and attempts to open it under the local key.
pub fn receive_probe(
    inbox: &Inbox,
    key: &[u8; crypto::KEY_SIZE],
    timeout: Duration,
) -> SecureOutcome {
    let deadline = Instant::now() + timeout;
    let message = inbox.take(deadline, |m| matches!(m, PublicMessage::SecureMessage(_)));

    let sealed = match message {
        Some(PublicMessage::SecureMessage(sealed)) => sealed,
        _ => return SecureOutcome::Missing,
    };

    match crypto::open(&sealed, key) {
        Some(plaintext) => SecureOutcome::Recovered(plaintext),
        None => SecureOutcome::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::Loopback;

    const PROBE: &[u8] = b"Launch Codes: 999-000-XYZ";

    #[test]
    fn test_matching_keys_recover_plaintext() {
        let mut mesh = Loopback::mesh(2);
        let (_a_inbox, a_channel) = mesh.remove(0);
        let (b_inbox, _b_channel) = mesh.remove(0);

        let key = [0x42u8; crypto::KEY_SIZE];

        assert_eq!(send_probe(&a_channel, &key, PROBE).unwrap(), SecureOutcome::Sent);

        let outcome = receive_probe(&b_inbox, &key, Duration::from_millis(100));

        assert_eq!(outcome, SecureOutcome::Recovered(PROBE.to_vec()));
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let mut mesh = Loopback::mesh(2);
        let (_a_inbox, a_channel) = mesh.remove(0);
        let (b_inbox, _b_channel) = mesh.remove(0);

        send_probe(&a_channel, &[1u8; crypto::KEY_SIZE], PROBE).unwrap();

        let outcome = receive_probe(&b_inbox, &[2u8; crypto::KEY_SIZE], Duration::from_millis(100));

        assert_eq!(outcome, SecureOutcome::Rejected);
    }

    #[test]
    fn test_missing_probe_times_out() {
        let inbox = Inbox::new();

        let outcome = receive_probe(&inbox, &[0u8; crypto::KEY_SIZE], Duration::from_millis(20));

        assert_eq!(outcome, SecureOutcome::Missing);
    }

    #[test]
    fn test_wire_size_of_probe() {
        // 25 plaintext bytes seal to 16 nonce + 16 tag + 25 body = 57 bytes,
        // 114 hex characters on the wire.
        let sealed = crypto::seal(PROBE, &[7u8; crypto::KEY_SIZE]).unwrap();
        let line = PublicMessage::SecureMessage(sealed).encode();

        assert!(line.starts_with("SECURE_MSG:"));
        assert!(line["SECURE_MSG:".len()..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(line.len() - "SECURE_MSG:".len(), 2 * (PROBE.len() + 32));
    }
}
