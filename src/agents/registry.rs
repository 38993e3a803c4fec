//! Storage seam for agent descriptors

use super::{AgentDescriptor, AgentStatus};
use indexmap::IndexMap;
use std::sync::{PoisonError, RwLock};

pub trait AgentRegistry: Send + Sync {
    fn register(&self, agent: AgentDescriptor);

    fn get(&self, id: &str) -> Option<AgentDescriptor>;

    /// Remove and return the descriptor for `id`
    fn remove(&self, id: &str) -> Option<AgentDescriptor>;

    /// All agents in creation order
    fn list(&self) -> Vec<AgentDescriptor>;

    fn set_status(&self, id: &str, status: AgentStatus);
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<IndexMap<String, AgentDescriptor>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentRegistry for InMemoryAgentRegistry {
    fn register(&self, agent: AgentDescriptor) {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent.id.clone(), agent);
    }

    fn get(&self, id: &str) -> Option<AgentDescriptor> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &str) -> Option<AgentDescriptor> {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(id)
    }

    fn list(&self) -> Vec<AgentDescriptor> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn set_status(&self, id: &str, status: AgentStatus) {
        if let Some(agent) = self
            .agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            agent.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, slot: usize) -> AgentDescriptor {
        AgentDescriptor {
            id: id.to_string(),
            slot,
            name: format!("agent-{}", slot),
            model: None,
            tools: Vec::new(),
            memory: false,
            system_prompt: None,
            created_at: chrono::Utc::now(),
            status: AgentStatus::Initializing,
        }
    }

    #[test]
    fn test_register_list_remove() {
        let registry = InMemoryAgentRegistry::new();
        registry.register(agent("a", 0));
        registry.register(agent("b", 1));
        registry.register(agent("c", 2));

        assert!(registry.remove("b").is_some());
        assert!(registry.remove("b").is_none());
        let ids: Vec<String> = registry.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_set_status() {
        let registry = InMemoryAgentRegistry::new();
        registry.register(agent("a", 0));
        registry.set_status("a", AgentStatus::Ready);
        registry.set_status("missing", AgentStatus::Ready);
        assert_eq!(registry.get("a").map(|a| a.status), Some(AgentStatus::Ready));
    }
}
