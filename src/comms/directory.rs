use std::collections::HashMap;

use crate::common::types::ParticipantId;

/// Capability based discovery. Search results keep registration order.
pub(super) struct Directory {
    services: HashMap<String, Vec<ParticipantId>>,
}

impl Directory {
    pub(super) fn new() -> Self {
        Directory {
            services: HashMap::new(),
        }
    }

    pub(super) fn register(&mut self, id: ParticipantId, capability: impl Into<String>) {
        let providers = self.services.entry(capability.into()).or_default();
        if !providers.contains(&id) {
            providers.push(id);
        }
    }

    pub(super) fn deregister(&mut self, id: &ParticipantId) {
        for providers in self.services.values_mut() {
            providers.retain(|provider| provider != id);
        }
    }

    pub(super) fn search(&self, capability: &str) -> Vec<ParticipantId> {
        self.services.get(capability).cloned().unwrap_or_default()
    }
}
