//! Text grammar of the public side channel. Every message is one line; the
//! receiver anchors on the tag by substring search so per-frame noise logged
//! by the radio ahead of the payload does not break parsing.

/// A public-channel message. Cascade traffic and the sealed round-trip probe
/// are observable by everyone on the air, including the eavesdropper.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PublicMessage {
    /// Block parities of one pass, in block order.
    CascadeInit { pass: u32, parities: Vec<u8> },
    /// Parity request over the permuted window `[start, start + length)`.
    CascadeRequest { pass: u32, start: usize, length: usize },
    /// Parity answer for the window starting at `start`.
    CascadeResponse { pass: u32, start: usize, parity: u8 },
    /// Responder finished the pass.
    CascadeDone { pass: u32 },
    /// Sealed probe: `nonce ‖ tag ‖ ciphertext`, hex on the wire.
    SecureMessage(Vec<u8>),
    /// Presence probe of the pre-session barrier.
    SyncCheck,
    /// Barrier release.
    SyncGo,
}

const TAG_INIT: &str = "CAS_INIT:";
const TAG_REQ: &str = "CAS_REQ:";
const TAG_RESP: &str = "CAS_RESP:";
const TAG_DONE: &str = "CAS_DONE:";
const TAG_SECURE: &str = "SECURE_MSG:";
const TAG_SYNC_CHECK: &str = "SYNC_CHECK";
const TAG_SYNC_GO: &str = "SYNC_GO";

impl PublicMessage {
    /// Renders the single-line wire form (no terminating newline).
    pub fn encode(&self) -> String {
        match self {
            PublicMessage::CascadeInit { pass, parities } => {
                let bits: String = parities.iter().map(|&p| if p == 0 { '0' } else { '1' }).collect();
                format!("{}{}:{}", TAG_INIT, pass, bits)
            }
            PublicMessage::CascadeRequest { pass, start, length } => {
                format!("{}{}:{}:{}", TAG_REQ, pass, start, length)
            }
            PublicMessage::CascadeResponse { pass, start, parity } => {
                format!("{}{}:{}:{}", TAG_RESP, pass, start, parity)
            }
            PublicMessage::CascadeDone { pass } => format!("{}{}", TAG_DONE, pass),
            PublicMessage::SecureMessage(sealed) => format!("{}{}", TAG_SECURE, hex::encode(sealed)),
            PublicMessage::SyncCheck => TAG_SYNC_CHECK.to_string(),
            PublicMessage::SyncGo => TAG_SYNC_GO.to_string(),
        }
    }

    /// Locates a known tag anywhere in the line and parses from there.
    /// Returns `None` for lines without a tag or with unusable fields.
    pub fn decode(line: &str) -> Option<PublicMessage> {
        if let Some(rest) = tag_tail(line, TAG_INIT) {
            let mut fields = rest.splitn(2, ':');
            let pass = parse_number(fields.next()?)? as u32;
            let parities = sanitize_bits(fields.next().unwrap_or(""));
            return Some(PublicMessage::CascadeInit { pass, parities });
        }

        if let Some(rest) = tag_tail(line, TAG_REQ) {
            let mut fields = rest.splitn(3, ':');
            let pass = parse_number(fields.next()?)? as u32;
            let start = parse_number(fields.next()?)?;
            let length = parse_number(fields.next()?)?;
            return Some(PublicMessage::CascadeRequest { pass, start, length });
        }

        if let Some(rest) = tag_tail(line, TAG_RESP) {
            let mut fields = rest.splitn(3, ':');
            let pass = parse_number(fields.next()?)? as u32;
            let start = parse_number(fields.next()?)?;
            let parity = match parse_number(fields.next()?)? {
                0 => 0,
                1 => 1,
                _ => return None,
            };
            return Some(PublicMessage::CascadeResponse { pass, start, parity });
        }

        if let Some(rest) = tag_tail(line, TAG_DONE) {
            let pass = parse_number(rest.splitn(2, ':').next()?)? as u32;
            return Some(PublicMessage::CascadeDone { pass });
        }

        if let Some(rest) = tag_tail(line, TAG_SECURE) {
            let cleaned: String = rest.chars().filter(|c| c.is_ascii_hexdigit()).collect();
            let sealed = hex::decode(cleaned).ok()?;
            return Some(PublicMessage::SecureMessage(sealed));
        }

        if line.contains(TAG_SYNC_CHECK) {
            return Some(PublicMessage::SyncCheck);
        }

        if line.contains(TAG_SYNC_GO) {
            return Some(PublicMessage::SyncGo);
        }

        None
    }

    /// Pass index for cascade messages, `None` otherwise.
    #[inline]
    pub fn pass(&self) -> Option<u32> {
        match self {
            PublicMessage::CascadeInit { pass, .. }
            | PublicMessage::CascadeRequest { pass, .. }
            | PublicMessage::CascadeResponse { pass, .. }
            | PublicMessage::CascadeDone { pass } => Some(*pass),
            _ => None,
        }
    }

    /// Wire tag, for logs.
    #[inline]
    pub fn tag_name(&self) -> &'static str {
        match self {
            PublicMessage::CascadeInit { .. } => "CAS_INIT",
            PublicMessage::CascadeRequest { .. } => "CAS_REQ",
            PublicMessage::CascadeResponse { .. } => "CAS_RESP",
            PublicMessage::CascadeDone { .. } => "CAS_DONE",
            PublicMessage::SecureMessage(_) => "SECURE_MSG",
            PublicMessage::SyncCheck => "SYNC_CHECK",
            PublicMessage::SyncGo => "SYNC_GO",
        }
    }
}

#[inline]
fn tag_tail<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.find(tag).map(|idx| &line[idx + tag.len()..])
}

/// Extracts the decimal digits of a field, ignoring stray characters the
/// radio may append, and parses them. Empty fields are rejected.
fn parse_number(field: &str) -> Option<usize> {
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    digits.parse().ok()
}

/// Keeps only the `0`/`1` characters of a parity string.
fn sanitize_bits(field: &str) -> Vec<u8> {
    field
        .chars()
        .filter_map(|c| match c {
            '0' => Some(0),
            '1' => Some(1),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_kinds() {
        let messages = vec![
            PublicMessage::CascadeInit { pass: 3, parities: vec![1, 0, 1, 1] },
            PublicMessage::CascadeRequest { pass: 0, start: 4, length: 2 },
            PublicMessage::CascadeResponse { pass: 1, start: 6, parity: 1 },
            PublicMessage::CascadeDone { pass: 5 },
            PublicMessage::SecureMessage(vec![0xde, 0xad, 0xbe, 0xef]),
            PublicMessage::SyncCheck,
            PublicMessage::SyncGo,
        ];

        for message in messages {
            assert_eq!(PublicMessage::decode(&message.encode()), Some(message));
        }
    }

    #[test]
    fn test_decode_tolerates_prefix_noise() {
        let line = "MSG_RECV from aa:bb:cc:dd:ee:ff: CAS_REQ:0:12:4";

        assert_eq!(
            PublicMessage::decode(line),
            Some(PublicMessage::CascadeRequest { pass: 0, start: 12, length: 4 })
        );
    }

    #[test]
    fn test_decode_sanitizes_parity_string() {
        let line = "CAS_INIT:2:10 1\r";

        assert_eq!(
            PublicMessage::decode(line),
            Some(PublicMessage::CascadeInit { pass: 2, parities: vec![1, 0, 1] })
        );
    }

    #[test]
    fn test_decode_accepts_uppercase_hex() {
        let line = "SECURE_MSG:DEADBEEF";

        assert_eq!(
            PublicMessage::decode(line),
            Some(PublicMessage::SecureMessage(vec![0xde, 0xad, 0xbe, 0xef]))
        );
    }

    #[test]
    fn test_decode_rejects_junk() {
        assert_eq!(PublicMessage::decode("CSI_DATA,[1,2,3]"), None);
        assert_eq!(PublicMessage::decode("CAS_RESP:0:4:7"), None);
        assert_eq!(PublicMessage::decode("CAS_REQ:::"), None);
        assert_eq!(PublicMessage::decode(""), None);
    }

    #[test]
    fn test_decode_rejects_odd_hex() {
        assert_eq!(PublicMessage::decode("SECURE_MSG:abc"), None);
    }

    #[test]
    fn test_done_with_trailing_newline() {
        assert_eq!(
            PublicMessage::decode("CAS_DONE:4\r\n"),
            Some(PublicMessage::CascadeDone { pass: 4 })
        );
    }
}
