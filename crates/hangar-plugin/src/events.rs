// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications for observers of the catalog.
//!
//! Events are published after the corresponding state swap completes, so a
//! subscriber that reacts by querying a projection sees the new state.

use hangar_core::ListInvalidationKind;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// A catalog change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A repository finished reloading or the repository set changed.
    AvailableChanged,
    /// A module was added to or removed from the installed set.
    InstalledChanged,
    /// One or more modules changed lifecycle state.
    StateChanged {
        kind: ListInvalidationKind,
        internal_names: Vec<String>,
    },
}

/// Broadcast bus for [`CatalogEvent`]s. Slow subscribers lag rather than block publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current subscriber. Publishing with no subscribers is not an error.
    pub fn publish(&self, event: CatalogEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(subscribers = delivered, "catalog event published");
    }

    pub fn state_changed(&self, kind: ListInvalidationKind, internal_name: &str) {
        self.publish(CatalogEvent::StateChanged {
            kind,
            internal_names: vec![internal_name.to_string()],
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(CatalogEvent::AvailableChanged);
        bus.state_changed(ListInvalidationKind::Loaded, "Sample");

        assert_eq!(rx.recv().await.unwrap(), CatalogEvent::AvailableChanged);
        assert_eq!(
            rx.recv().await.unwrap(),
            CatalogEvent::StateChanged {
                kind: ListInvalidationKind::Loaded,
                internal_names: vec!["Sample".into()],
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        EventBus::new().publish(CatalogEvent::InstalledChanged);
    }
}
