use crate::message::PublicMessage;
use crate::queue::Inbox;
use crate::support::PlkgResult;
use std::sync::Arc;

/// Transmission side of the public channel. Everything published here is
/// observable by every other endpoint, the eavesdropper included; the medium
/// does not echo a sender's own transmissions back to it.
pub trait PublicChannel: Send + Sync {
    fn publish(&self, message: &PublicMessage) -> PlkgResult<()>;
}

/// In-process medium: delivers published messages straight into the other
/// endpoints' inboxes. Lets the whole pipeline run and be tested without
/// radios; the serial deployment swaps in the radio link behind the same
/// trait.
pub struct Loopback {
    peers: Vec<Arc<Inbox>>,
}

impl Loopback {
    /// Builds a medium delivering to the supplied peer inboxes. The sender's
    /// own inbox must not be among them.
    pub fn new(peers: Vec<Arc<Inbox>>) -> Loopback {
        Loopback { peers }
    }

    /// Wires up a full session: returns one `(inbox, channel)` pair per
    /// requested endpoint, each channel reaching all the other inboxes.
    pub fn mesh(endpoints: usize) -> Vec<(Arc<Inbox>, Loopback)> {
        let inboxes: Vec<_> = (0..endpoints).map(|_| Arc::new(Inbox::new())).collect();

        inboxes
            .iter()
            .enumerate()
            .map(|(i, inbox)| {
                let peers = inboxes
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, peer)| peer.clone())
                    .collect();

                (inbox.clone(), Loopback::new(peers))
            })
            .collect()
    }
}

impl PublicChannel for Loopback {
    fn publish(&self, message: &PublicMessage) -> PlkgResult<()> {
        for peer in &self.peers {
            peer.push(message.clone());
        }

        Ok(())
    }
}
