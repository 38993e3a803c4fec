//! Fixed-size pool of agent slots
//!
//! Slot state lives behind one `std::sync::Mutex` that is never held across
//! an `.await`. A slot is claimed synchronously before any await and released
//! by a drop guard, so it frees up on success, error, cancellation and panic.

use super::registry::{AgentRegistry, InMemoryAgentRegistry};
use super::{
    AgentConfig, AgentDescriptor, AgentSlot, AgentStatus, AgentTask, CurrentTask,
    SLOT_CAPABILITIES, prompts,
};
use crate::config::AgentsConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, Outcome};
use crate::router::{ChatRequest, ChatResult, ChatService};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct AgentPool {
    slots: Mutex<Vec<Option<CurrentTask>>>,
    registry: Arc<dyn AgentRegistry>,
    code_model: String,
    metrics: Option<Arc<Metrics>>,
}

/// Frees its slot when dropped
struct SlotGuard<'a> {
    pool: &'a AgentPool,
    slot: usize,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.pool.lock_slots().get_mut(self.slot) {
            *state = None;
        }
        self.pool.publish_busy_slots();
    }
}

impl AgentPool {
    pub fn new(
        max_agents: usize,
        code_model: impl Into<String>,
        registry: Arc<dyn AgentRegistry>,
    ) -> Self {
        Self {
            slots: Mutex::new(vec![None; max_agents]),
            registry,
            code_model: code_model.into(),
            metrics: None,
        }
    }

    pub fn from_config(config: &AgentsConfig) -> Self {
        Self::new(
            config.max_agents,
            config.code_model.clone(),
            Arc::new(InMemoryAgentRegistry::new()),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn capacity(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn code_model(&self) -> &str {
        &self.code_model
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Option<CurrentTask>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_busy_slots(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_busy_agent_slots(self.active_count());
        }
    }

    /// Register an agent on the lowest free slot
    ///
    /// The slot stays reserved until the agent's first task finishes or the
    /// agent is deleted.
    pub fn create_agent(&self, config: AgentConfig) -> AppResult<AgentDescriptor> {
        let id = uuid::Uuid::new_v4().to_string();

        let slot = {
            let mut slots = self.lock_slots();
            let max = slots.len();
            let slot = slots
                .iter()
                .position(Option::is_none)
                .ok_or(AppError::AgentCapacityExceeded { max })?;
            slots[slot] = Some(CurrentTask::Initialize {
                agent_id: id.clone(),
            });
            slot
        };
        self.publish_busy_slots();

        let agent = AgentDescriptor {
            name: config.name.unwrap_or_else(|| format!("agent-{}", slot)),
            id,
            slot,
            model: config.model,
            tools: config.tools,
            memory: config.memory,
            system_prompt: config.system_prompt,
            created_at: chrono::Utc::now(),
            status: AgentStatus::Initializing,
        };
        self.registry.register(agent.clone());

        tracing::info!(agent_id = %agent.id, slot, name = %agent.name, "Agent created");
        Ok(agent)
    }

    /// Run `task` on `slot` through `service`
    ///
    /// Fails with `AgentNotFound` for an unknown slot and `AgentBusy` when the
    /// slot is already running a task. A slot holding only an initialization
    /// reservation accepts the task and its agent becomes ready.
    pub async fn assign_task(
        &self,
        slot: usize,
        task: AgentTask,
        service: &dyn ChatService,
    ) -> AppResult<ChatResult> {
        let agent_id = {
            let mut slots = self.lock_slots();
            let state = slots
                .get_mut(slot)
                .ok_or_else(|| AppError::AgentNotFound(format!("slot {}", slot)))?;
            if let Some(CurrentTask::Running { .. }) = state {
                return Err(AppError::AgentBusy { slot });
            }
            let agent_id = state
                .as_ref()
                .and_then(|current| current.agent_id().map(str::to_string));
            *state = Some(CurrentTask::Running {
                kind: task.kind(),
                agent_id: agent_id.clone(),
                started_at: chrono::Utc::now(),
            });
            agent_id
        };
        let _guard = SlotGuard { pool: self, slot };
        self.publish_busy_slots();

        let agent = agent_id.as_deref().and_then(|id| self.registry.get(id));
        if let Some(agent) = &agent {
            self.registry.set_status(&agent.id, AgentStatus::Ready);
        }

        let request = self.build_request(&task, agent.as_ref());
        tracing::debug!(
            slot,
            kind = task.kind(),
            model = request.model.as_deref().unwrap_or("auto"),
            "Running agent task"
        );

        let result = service.chat(&request).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_agent_task(task.kind(), Outcome::from_result(&result));
        }
        if let Err(e) = &result {
            tracing::warn!(slot, kind = task.kind(), error = %e, "Agent task failed");
        }
        result
    }

    fn build_request(&self, task: &AgentTask, agent: Option<&AgentDescriptor>) -> ChatRequest {
        let mut request = ChatRequest::new(prompts::render(task));
        request.model = if task.uses_code_model() {
            Some(self.code_model.clone())
        } else {
            agent.and_then(|a| a.model.clone())
        };
        request.system_prompt = agent.and_then(|a| a.system_prompt.clone());
        request
    }

    /// Remove an agent
    ///
    /// Frees the agent's slot only if it still holds the initialization
    /// reservation; a running task is left to finish.
    pub fn delete_agent(&self, id: &str) -> AppResult<AgentDescriptor> {
        let agent = self
            .registry
            .remove(id)
            .ok_or_else(|| AppError::AgentNotFound(id.to_string()))?;

        let freed = {
            let mut slots = self.lock_slots();
            let reserved = matches!(
                slots.get(agent.slot),
                Some(Some(CurrentTask::Initialize { agent_id })) if agent_id == id
            );
            if reserved {
                slots[agent.slot] = None;
            }
            reserved
        };
        self.publish_busy_slots();

        tracing::info!(agent_id = %id, slot = agent.slot, freed_slot = freed, "Agent deleted");
        Ok(agent)
    }

    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.registry.list()
    }

    pub fn slots(&self) -> Vec<AgentSlot> {
        self.lock_slots()
            .iter()
            .enumerate()
            .map(|(id, current)| AgentSlot {
                id,
                busy: current.is_some(),
                current_task: current.clone(),
                capabilities: &SLOT_CAPABILITIES,
            })
            .collect()
    }

    /// Slots that are reserved or running a task
    pub fn active_count(&self) -> usize {
        self.lock_slots().iter().filter(|s| s.is_some()).count()
    }

    pub fn available_slots(&self) -> usize {
        self.lock_slots().iter().filter(|s| s.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ChunkStream, Provider};
    use crate::router::EmbeddingResult;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Records requests and answers (or fails) immediately
    #[derive(Default)]
    struct RecordingService {
        requests: Mutex<Vec<ChatRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatService for RecordingService {
        async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResult> {
            self.requests
                .lock()
                .expect("lock")
                .push(request.clone());
            if self.fail {
                return Err(AppError::ModelUnavailable {
                    model: "m".to_string(),
                    provider: "ollama".to_string(),
                    reason: "down".to_string(),
                });
            }
            Ok(ChatResult {
                content: "ok".to_string(),
                usage: Default::default(),
                model: request.model.clone().unwrap_or_default(),
                provider: Provider::Ollama,
                timestamp: chrono::Utc::now(),
            })
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> AppResult<ChunkStream> {
            Err(AppError::Internal("not used".to_string()))
        }

        async fn generate_embeddings(
            &self,
            _input: &str,
            _model: Option<&str>,
        ) -> AppResult<EmbeddingResult> {
            Err(AppError::Internal("not used".to_string()))
        }
    }

    /// Blocks every chat until released
    #[derive(Default)]
    struct GatedService {
        gate: Notify,
        inner: RecordingService,
    }

    #[async_trait]
    impl ChatService for GatedService {
        async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResult> {
            self.gate.notified().await;
            self.inner.chat(request).await
        }

        async fn chat_stream(&self, request: &ChatRequest) -> AppResult<ChunkStream> {
            self.inner.chat_stream(request).await
        }

        async fn generate_embeddings(
            &self,
            input: &str,
            model: Option<&str>,
        ) -> AppResult<EmbeddingResult> {
            self.inner.generate_embeddings(input, model).await
        }
    }

    fn pool(max: usize) -> AgentPool {
        AgentPool::new(max, "qwen2.5-coder:3b", Arc::new(InMemoryAgentRegistry::new()))
    }

    fn chat_task() -> AgentTask {
        AgentTask::Chat {
            message: "hello".to_string(),
        }
    }

    #[test]
    fn test_create_agent_until_capacity() {
        let pool = pool(2);
        let first = pool.create_agent(AgentConfig::default()).expect("slot 0");
        let second = pool.create_agent(AgentConfig::default()).expect("slot 1");
        assert_eq!((first.slot, second.slot), (0, 1));
        assert_eq!(first.status, AgentStatus::Initializing);
        assert_eq!(first.name, "agent-0");

        let err = pool
            .create_agent(AgentConfig::default())
            .expect_err("pool is full");
        assert!(matches!(err, AppError::AgentCapacityExceeded { max: 2 }));
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.available_slots(), 0);
    }

    #[test]
    fn test_delete_frees_reserved_slot_for_reuse() {
        let pool = pool(2);
        let first = pool.create_agent(AgentConfig::default()).expect("create");
        pool.create_agent(AgentConfig::default()).expect("create");

        pool.delete_agent(&first.id).expect("delete");
        let again = pool.create_agent(AgentConfig::default()).expect("slot 0 is free");
        assert_eq!(again.slot, 0);
        assert_eq!(pool.list_agents().len(), 2);

        assert!(matches!(
            pool.delete_agent("missing"),
            Err(AppError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_slot_is_not_found() {
        let pool = pool(1);
        let service = RecordingService::default();
        let err = pool
            .assign_task(5, chat_task(), &service)
            .await
            .expect_err("slot 5 does not exist");
        assert!(matches!(err, AppError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let pool = pool(1);
        let agent = pool.create_agent(AgentConfig::default()).expect("create");
        let service = RecordingService {
            fail: true,
            ..Default::default()
        };

        assert!(pool.assign_task(agent.slot, chat_task(), &service).await.is_err());
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.slots()[0].busy);
        assert_eq!(
            pool.list_agents()[0].status,
            AgentStatus::Ready,
            "first task consumes the reservation"
        );
    }

    #[tokio::test]
    async fn test_completed_task_frees_exactly_one_slot() {
        let pool = pool(3);
        let agents: Vec<_> = (0..3)
            .map(|_| pool.create_agent(AgentConfig::default()).expect("create"))
            .collect();
        assert!(matches!(
            pool.create_agent(AgentConfig::default()),
            Err(AppError::AgentCapacityExceeded { max: 3 })
        ));

        let service = RecordingService::default();
        pool.assign_task(agents[1].slot, chat_task(), &service)
            .await
            .expect("task completes");
        assert_eq!(pool.available_slots(), 1);

        let replacement = pool
            .create_agent(AgentConfig::default())
            .expect("one slot was released");
        assert_eq!(replacement.slot, agents[1].slot);
        assert!(matches!(
            pool.create_agent(AgentConfig::default()),
            Err(AppError::AgentCapacityExceeded { max: 3 })
        ));
        assert_eq!(pool.active_count(), 3);
    }

    #[tokio::test]
    async fn test_busy_slot_rejects_second_task() {
        let pool = pool(1);
        let service = GatedService::default();

        let first = pool.assign_task(0, chat_task(), &service);
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(pool.slots()[0].busy);

        let err = pool
            .assign_task(0, chat_task(), &service)
            .await
            .expect_err("slot is running");
        assert!(matches!(err, AppError::AgentBusy { slot: 0 }));

        service.gate.notify_one();
        first.await.expect("first task completes");
        assert_eq!(pool.active_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_task_releases_slot() {
        let pool = pool(1);
        let service = GatedService::default();
        {
            let task = pool.assign_task(0, chat_task(), &service);
            tokio::pin!(task);
            assert!(futures::poll!(&mut task).is_pending());
            assert_eq!(pool.active_count(), 1);
        }
        assert_eq!(pool.active_count(), 0);
    }

    #[tokio::test]
    async fn test_code_tasks_use_code_model_and_chat_uses_agent_model() {
        let pool = pool(2);
        let agent = pool
            .create_agent(AgentConfig {
                model: Some("llama3:8b".to_string()),
                system_prompt: Some("be terse".to_string()),
                ..Default::default()
            })
            .expect("create");
        let service = RecordingService::default();

        pool.assign_task(agent.slot, chat_task(), &service)
            .await
            .expect("chat");
        pool.assign_task(
            1,
            AgentTask::Fix {
                code: "let x = ;".to_string(),
                issue: None,
            },
            &service,
        )
        .await
        .expect("fix");

        let requests = service.requests.lock().expect("lock");
        assert_eq!(requests[0].model.as_deref(), Some("llama3:8b"));
        assert_eq!(requests[0].system_prompt.as_deref(), Some("be terse"));
        assert_eq!(requests[0].message, "hello");
        assert_eq!(requests[1].model.as_deref(), Some("qwen2.5-coder:3b"));
        assert!(requests[1].message.contains("let x = ;"));
    }

    #[tokio::test]
    async fn test_delete_does_not_interrupt_running_task() {
        let pool = pool(1);
        let agent = pool.create_agent(AgentConfig::default()).expect("create");
        let service = GatedService::default();

        let task = pool.assign_task(agent.slot, chat_task(), &service);
        tokio::pin!(task);
        assert!(futures::poll!(&mut task).is_pending());

        pool.delete_agent(&agent.id).expect("delete");
        assert!(pool.slots()[0].busy, "running task keeps its slot");

        service.gate.notify_one();
        task.await.expect("task completes");
        assert_eq!(pool.active_count(), 0);
    }
}
