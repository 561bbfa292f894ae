// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::models::source::Invocation;
use crate::engines::traits::{CrawlerCapability, InvocationError};

/// 站点能力注册表
///
/// 以 [`Invocation`] 为键，名称集合在编译期封闭，
/// 未注册的名称在解析时返回 `UnknownInvocation`
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<Invocation, Arc<dyn CrawlerCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册站点能力
    ///
    /// # 返回值
    ///
    /// 同名能力已存在时返回被替换的旧能力
    pub fn register(
        &mut self,
        capability: Arc<dyn CrawlerCapability>,
    ) -> Option<Arc<dyn CrawlerCapability>> {
        let invocation = capability.invocation();
        let previous = self.capabilities.insert(invocation, capability);
        if previous.is_some() {
            warn!(invocation = %invocation, "Replacing registered capability");
        }
        previous
    }

    pub fn with(mut self, capability: Arc<dyn CrawlerCapability>) -> Self {
        self.register(capability);
        self
    }

    /// 按名称解析站点能力
    pub fn resolve(
        &self,
        invocation: Invocation,
    ) -> Result<Arc<dyn CrawlerCapability>, InvocationError> {
        self.capabilities
            .get(&invocation)
            .cloned()
            .ok_or(InvocationError::UnknownInvocation(invocation))
    }

    pub fn contains(&self, invocation: Invocation) -> bool {
        self.capabilities.contains_key(&invocation)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
