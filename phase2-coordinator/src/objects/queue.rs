use crate::{objects::ConnectionId, CoordinatorError};

use std::{collections::VecDeque, time::Duration};
use time::OffsetDateTime;
use tracing::{debug, trace};

/// The connection currently permitted to submit a contribution.
#[derive(Debug, Clone, Eq, PartialEq)]
struct ActiveSlot {
    connection: ConnectionId,
    since: OffsetDateTime,
}

///
/// A bounded first-in first-out queue of waiting connections,
/// together with the marker of the connection holding the active slot.
///
/// The active connection, if any, is always the head of the queue.
/// A connection stays in the queue while it is active, and leaves it
/// when it completes, withdraws, or times out.
///
/// # Thread Safety
/// A lock is required to access the queue.
///
#[derive(Debug)]
pub struct ConnectionQueue {
    capacity: usize,
    waiting: VecDeque<ConnectionId>,
    active: Option<ActiveSlot>,
}

impl ConnectionQueue {
    /// Creates a new empty queue holding at most `capacity` connections.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            waiting: VecDeque::with_capacity(capacity),
            active: None,
        }
    }

    ///
    /// Appends the connection to the tail of the queue and returns its 1-based position.
    ///
    /// Admitting a connection that is already queued returns its current position.
    ///
    pub fn admit(&mut self, connection: ConnectionId) -> Result<usize, CoordinatorError> {
        if let Some(position) = self.position_of(&connection) {
            trace!("{} is already queued at position {}", connection, position);
            return Ok(position);
        }

        if self.waiting.len() >= self.capacity {
            return Err(CoordinatorError::QueueFull(self.capacity));
        }

        debug!("Admitting {} to the queue", connection);
        self.waiting.push_back(connection);
        Ok(self.waiting.len())
    }

    ///
    /// Removes the connection wherever it sits in the queue, and clears the
    /// active marker if the connection held it.
    ///
    /// Returns `true` if the connection was queued.
    ///
    pub fn withdraw(&mut self, connection: &ConnectionId) -> bool {
        if self.active.as_ref().map_or(false, |slot| &slot.connection == connection) {
            debug!("Clearing the active slot held by {}", connection);
            self.active = None;
        }

        match self.waiting.iter().position(|c| c == connection) {
            Some(index) => {
                debug!("Removing {} from the queue", connection);
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the 1-based position of the connection, or `None` if it is not queued.
    #[inline]
    pub fn position_of(&self, connection: &ConnectionId) -> Option<usize> {
        self.waiting.iter().position(|c| c == connection).map(|index| index + 1)
    }

    /// Returns the connection at the head of the queue.
    #[inline]
    pub fn head(&self) -> Option<&ConnectionId> {
        self.waiting.front()
    }

    /// Returns the connection holding the active slot.
    #[inline]
    pub fn active(&self) -> Option<&ConnectionId> {
        self.active.as_ref().map(|slot| &slot.connection)
    }

    /// Returns the time the active slot was granted.
    #[inline]
    pub fn active_since(&self) -> Option<OffsetDateTime> {
        self.active.as_ref().map(|slot| slot.since)
    }

    ///
    /// Sets or clears the active marker.
    ///
    /// Only the head of the queue may become active.
    ///
    pub fn set_active(&mut self, connection: Option<ConnectionId>) -> Result<(), CoordinatorError> {
        match connection {
            Some(connection) => {
                if self.head() != Some(&connection) {
                    return Err(CoordinatorError::NotQueueHead(connection.to_string()));
                }
                if self.active() != Some(&connection) {
                    self.active = Some(ActiveSlot {
                        connection,
                        since: OffsetDateTime::now_utc(),
                    });
                }
            }
            None => self.active = None,
        }
        Ok(())
    }

    ///
    /// Grants the active slot to the head of the queue if no one holds it.
    ///
    /// Returns the newly promoted connection.
    ///
    pub fn promote(&mut self) -> Option<ConnectionId> {
        if self.active.is_some() {
            return None;
        }

        let head = self.head()?.clone();
        self.active = Some(ActiveSlot {
            connection: head.clone(),
            since: OffsetDateTime::now_utc(),
        });
        Some(head)
    }

    ///
    /// Removes the connection and promotes the next head in a single step.
    ///
    /// Returns the newly promoted connection.
    ///
    pub fn complete(&mut self, connection: &ConnectionId) -> Option<ConnectionId> {
        self.withdraw(connection);
        self.promote()
    }

    ///
    /// Withdraws the active connection if it has held the slot for at least `timeout`,
    /// and promotes the next head.
    ///
    /// Returns the expired connection.
    ///
    pub fn release_expired(&mut self, timeout: Duration, now: OffsetDateTime) -> Option<ConnectionId> {
        let slot = self.active.as_ref()?;
        let elapsed = (now - slot.since).whole_milliseconds();
        if elapsed < timeout.as_millis() as i128 {
            return None;
        }

        let expired = slot.connection.clone();
        self.complete(&expired);
        Some(expired)
    }

    /// Returns the waiting connections in queue order.
    #[inline]
    pub fn waiting(&self) -> impl Iterator<Item = &ConnectionId> {
        self.waiting.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
