//! Helpers feeding bytes through a [`Session`].

use std::sync::Arc;

use galileo::{
    session::{ConnectionId, DecodedEvent, FeedError, Session, SessionConfig},
    tag::TagRegistry,
};

/// Session over the built-in tag table with default limits.
#[must_use]
pub fn session() -> Session {
    Session::new(
        ConnectionId::new(1),
        Arc::new(TagRegistry::galileosky()),
        SessionConfig::default(),
    )
}

/// Feed `bytes` split at the cumulative `cuts`, concatenating the events.
///
/// Cut points beyond the input or out of order are clamped.
///
/// # Errors
///
/// Propagates a fatal session failure, with the events of every chunk fed
/// before it prepended to [`FeedError::events`].
pub fn feed_chunked(
    session: &mut Session,
    bytes: &[u8],
    cuts: &[usize],
) -> Result<Vec<DecodedEvent>, FeedError> {
    let mut events = Vec::new();
    let mut start = 0;
    let ends = cuts.iter().copied().chain(std::iter::once(bytes.len()));
    for cut in ends {
        let end = cut.clamp(start, bytes.len());
        match session.feed(&bytes[start..end]) {
            Ok(more) => events.extend(more),
            Err(mut failure) => {
                events.append(&mut failure.events);
                failure.events = events;
                return Err(failure);
            }
        }
        start = end;
    }
    Ok(events)
}

/// Shorthand for the events of a one-shot feed into a fresh [`session`].
///
/// # Panics
///
/// Panics if the session fails.
#[must_use]
pub fn events_of(bytes: &[u8]) -> Vec<DecodedEvent> {
    session().feed(bytes).expect("session should accept input")
}
