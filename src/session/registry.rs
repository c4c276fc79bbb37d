//! Concurrent table of live sessions.
//!
//! The TCP server gives each connection task exclusive ownership of its
//! [`Session`]. [`SessionRegistry`] is the alternative for hosts that receive
//! bytes through some other transport and want to address sessions by
//! [`ConnectionId`] from several threads.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;

use super::{ConnectionId, DecodedEvent, FeedError, Session, SessionConfig};
use crate::{codec::EofError, tag::TagRegistry};

/// Errors returned by [`SessionRegistry::feed`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegistryError {
    /// No session is open under this identifier.
    #[error("no open session for {0}")]
    UnknownConnection(ConnectionId),
    /// The session failed and has been removed. Events of frames completed
    /// before the failure travel with the error.
    #[error(transparent)]
    Failed(#[from] FeedError),
}

/// Sessions keyed by [`ConnectionId`], sharing one tag table and one config.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, Session>,
    tags: Arc<TagRegistry>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(tags: Arc<TagRegistry>, config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            tags,
            config,
        }
    }

    /// Open a session for `id`.
    ///
    /// Returns `false` and leaves the existing session untouched when `id` is
    /// already open.
    pub fn open(&self, id: ConnectionId) -> bool {
        match self.sessions.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Session::new(id, Arc::clone(&self.tags), self.config.clone()));
                true
            }
        }
    }

    /// Feed bytes to the session for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] when `id` is not open, and
    /// [`RegistryError::Failed`] when the session fails. A failed session is
    /// removed; its partial buffer is discarded.
    pub fn feed(&self, id: ConnectionId, bytes: &[u8]) -> Result<Vec<DecodedEvent>, RegistryError> {
        let result = {
            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or(RegistryError::UnknownConnection(id))?;
            session.feed(bytes)
        };
        result.map_err(|error| {
            self.sessions.remove(&id);
            RegistryError::from(error)
        })
    }

    /// Close and remove the session for `id`.
    ///
    /// Returns `None` when no such session was open.
    pub fn close(&self, id: ConnectionId) -> Option<EofError> {
        self.sessions.remove(&id).map(|(_, session)| session.close())
    }

    /// Whether a session is open under `id`.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool { self.sessions.contains_key(&id) }

    /// Identifiers of all open sessions.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.sessions.len() }

    /// Whether no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{checksum::crc16, codec::FramingError, frame::Ack};

    fn imei_frame() -> Vec<u8> {
        let mut frame = vec![0x01, 0x10, 0x00, 0x03];
        frame.extend_from_slice(b"868204005647838");
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    #[fixture]
    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(TagRegistry::galileosky()), SessionConfig::default())
    }

    #[rstest]
    fn open_is_idempotent(registry: SessionRegistry) {
        let id = ConnectionId::new(7);
        assert!(registry.open(id));
        assert!(!registry.open(id));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_ids(), vec![id]);
    }

    #[rstest]
    fn feed_unknown_connection_fails(registry: SessionRegistry) {
        let id = ConnectionId::new(3);
        assert_eq!(
            registry.feed(id, &[0x01]),
            Err(RegistryError::UnknownConnection(id))
        );
    }

    #[rstest]
    fn sessions_keep_separate_buffers(registry: SessionRegistry) {
        let (a, b) = (ConnectionId::new(1), ConnectionId::new(2));
        registry.open(a);
        registry.open(b);
        let frame = imei_frame();
        let (head, tail) = frame.split_at(5);

        assert!(registry.feed(a, head).expect("feed a").is_empty());
        let events = registry.feed(b, &frame).expect("feed b");
        assert_eq!(events.len(), 2);

        let events = registry.feed(a, tail).expect("finish a");
        let crc = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        assert_eq!(
            events.last(),
            Some(&DecodedEvent::AckRequired(Ack::for_checksum(crc)))
        );
    }

    #[rstest]
    fn close_reports_partial_frame(registry: SessionRegistry) {
        let id = ConnectionId::new(9);
        registry.open(id);
        registry.feed(id, &[0x01, 0x10]).expect("feed");
        assert_eq!(
            registry.close(id),
            Some(EofError::MidFrame { bytes_discarded: 2 })
        );
        assert!(!registry.contains(id));
        assert_eq!(registry.close(id), None);
    }

    #[test]
    fn fatal_error_removes_session() {
        let config = SessionConfig::default()
            .malformed_length_policy(crate::codec::RecoveryPolicy::Disconnect)
            .framer(crate::frame::FramerConfig::default().max_body_length(16));
        let registry = SessionRegistry::new(Arc::new(TagRegistry::galileosky()), config);
        let id = ConnectionId::new(4);
        registry.open(id);

        let mut input = imei_frame();
        input.extend_from_slice(&[0x01, 0x20, 0x00]);
        let Err(RegistryError::Failed(failure)) = registry.feed(id, &input) else {
            panic!("strict session must fail");
        };
        assert_eq!(
            failure.error,
            FramingError::MalformedLength {
                declared: 0x20,
                max: 16,
            }
        );
        assert_eq!(failure.events.len(), 2);
        assert!(registry.is_empty());
    }
}
