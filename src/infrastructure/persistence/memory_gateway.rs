// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::domain::models::job::JobStatus;
use crate::domain::repositories::persistence_gateway::{
    JobStatusRecord, PersistenceError, PersistenceGateway, TaskOutcomeRecord,
};

/// 内存持久化网关
///
/// 单进程部署和测试使用。同一终态重复写入是无操作，
/// 写入不同终态返回 Conflict。
#[derive(Default)]
pub struct InMemoryPersistenceGateway {
    outcomes: DashMap<Uuid, TaskOutcomeRecord>,
    statuses: DashMap<Uuid, JobStatus>,
    outcome_writes: AtomicUsize,
    status_writes: AtomicUsize,
}

impl InMemoryPersistenceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self, task_id: Uuid) -> Option<TaskOutcomeRecord> {
        self.outcomes.get(&task_id).map(|r| r.value().clone())
    }

    pub fn outcomes_for(&self, job_id: Uuid) -> Vec<TaskOutcomeRecord> {
        self.outcomes
            .iter()
            .filter(|r| r.job_id == job_id)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.statuses.get(&job_id).map(|s| *s)
    }

    /// 收到的任务结果写入次数（含重复写入）
    pub fn outcome_writes(&self) -> usize {
        self.outcome_writes.load(Ordering::SeqCst)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistenceGateway {
    async fn record_task_outcome(&self, record: &TaskOutcomeRecord) -> Result<(), PersistenceError> {
        self.outcome_writes.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.entry(record.task_id) {
            Entry::Occupied(existing) if existing.get().status != record.status => {
                Err(PersistenceError::Conflict(format!("task {}", record.task_id)))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn record_job_status(&self, record: &JobStatusRecord) -> Result<(), PersistenceError> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        match self.statuses.entry(record.job_id) {
            Entry::Occupied(existing) if *existing.get() != record.status => {
                Err(PersistenceError::Conflict(format!("job {}", record.job_id)))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(record.status);
                Ok(())
            }
        }
    }
}
