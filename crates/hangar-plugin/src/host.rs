// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators injected into every lifecycle controller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hangar_config::ConfigHandle;
use hangar_core::{ModuleLoader, ProfileResolver, ServiceContainer};
use uuid::Uuid;

use crate::ban::BanList;
use crate::coordinator::Coordinator;
use crate::events::EventBus;

/// Binary identities of live module instances, keyed to the owning working id.
#[derive(Debug, Default)]
pub struct LoadedIdentities {
    claims: Mutex<HashMap<String, Uuid>>,
}

impl LoadedIdentities {
    /// Claim `identity` for `owner`. Returns the current owner if another module holds it.
    pub fn claim(&self, identity: &str, owner: Uuid) -> Result<(), Uuid> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(identity) {
            Some(existing) if *existing != owner => Err(*existing),
            _ => {
                claims.insert(identity.to_string(), owner);
                Ok(())
            }
        }
    }

    /// Release `identity` if `owner` holds it.
    pub fn release(&self, identity: &str, owner: Uuid) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.get(identity) == Some(&owner) {
            claims.remove(identity);
        }
    }

    pub fn owner_of(&self, identity: &str) -> Option<Uuid> {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
    }
}

/// Everything a [`LocalPlugin`](crate::LocalPlugin) needs from its host.
pub struct PluginHost {
    config: ConfigHandle,
    loader: Arc<dyn ModuleLoader>,
    profiles: Arc<dyn ProfileResolver>,
    services: Arc<ServiceContainer>,
    coordinator: Coordinator,
    events: EventBus,
    identities: LoadedIdentities,
}

impl PluginHost {
    pub fn new(
        config: ConfigHandle,
        loader: Arc<dyn ModuleLoader>,
        profiles: Arc<dyn ProfileResolver>,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            config,
            loader,
            profiles,
            services: Arc::new(ServiceContainer::new()),
            coordinator,
            events: EventBus::new(),
            identities: LoadedIdentities::default(),
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn loader(&self) -> &dyn ModuleLoader {
        self.loader.as_ref()
    }

    pub fn profiles(&self) -> &dyn ProfileResolver {
        self.profiles.as_ref()
    }

    pub fn services(&self) -> &Arc<ServiceContainer> {
        &self.services
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn identities(&self) -> &LoadedIdentities {
        &self.identities
    }

    /// The ban list for the current configuration.
    pub fn bans(&self) -> BanList {
        BanList::from_config(&self.config.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_claims_are_exclusive() {
        let identities = LoadedIdentities::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        identities.claim("sample", a).unwrap();
        identities.claim("sample", a).unwrap();
        assert_eq!(identities.claim("sample", b), Err(a));

        identities.release("sample", b);
        assert_eq!(identities.owner_of("sample"), Some(a));
        identities.release("sample", a);
        assert!(identities.claim("sample", b).is_ok());
    }
}
