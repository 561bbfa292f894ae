// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::profile::SubjectProfile;
use crate::domain::models::source::TargetSource;
use crate::domain::models::task::CrawlTask;

/// 任务规划错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// 对象资料不完整
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
    /// 地址模板中出现未知占位符
    #[error("Unknown placeholder {{{placeholder}}} in template of source {source_id}")]
    UnknownPlaceholder {
        source_id: String,
        placeholder: String,
    },
    /// 地址模板中的占位符没有闭合
    #[error("Unterminated placeholder in template of source {0}")]
    MalformedTemplate(String),
}

/// 任务规划器
///
/// 按启用的数据源把对象资料展开为有序的任务列表。
/// 纯函数：不访问网络，不产生副作用。
#[derive(Debug, Clone)]
pub struct TaskPlanner {
    sources: Vec<TargetSource>,
}

impl TaskPlanner {
    pub fn new(sources: Vec<TargetSource>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[TargetSource] {
        &self.sources
    }

    /// 校验所有数据源的地址模板
    pub fn validate_templates(&self) -> Result<(), PlanError> {
        let probe = SubjectProfile::new("a", "b", "c", "d");
        for source in &self.sources {
            render_template(&source.id, &source.url_template, &probe)?;
        }
        Ok(())
    }

    /// 为一次扫描生成任务
    ///
    /// # 参数
    ///
    /// * `job_id` - 扫描ID
    /// * `profile` - 对象资料，所有字段必须非空
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<CrawlTask>)` - 与启用数据源顺序一致的任务列表
    /// * `Err(PlanError)` - 对象资料或模板无效
    pub fn plan(&self, job_id: Uuid, profile: &SubjectProfile) -> Result<Vec<CrawlTask>, PlanError> {
        profile
            .validate()
            .map_err(|e| PlanError::InvalidProfile(e.to_string()))?;

        self.sources
            .iter()
            .filter(|source| source.active)
            .map(|source| {
                let target_url = render_template(&source.id, &source.url_template, profile)?;
                Ok(CrawlTask::new(
                    job_id,
                    source.id.clone(),
                    source.invocation,
                    target_url,
                    profile.clone(),
                ))
            })
            .collect()
    }
}

/// 用对象资料替换模板中的 `{placeholder}`，替换值经过URL编码
fn render_template(
    source_id: &str,
    template: &str,
    profile: &SubjectProfile,
) -> Result<String, PlanError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PlanError::MalformedTemplate(source_id.to_string()))?;
        let placeholder = &after[..close];
        let value = profile
            .field(placeholder)
            .ok_or_else(|| PlanError::UnknownPlaceholder {
                source_id: source_id.to_string(),
                placeholder: placeholder.to_string(),
            })?;
        rendered.push_str(&urlencoding::encode(value.trim()));
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}
