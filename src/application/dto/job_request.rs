// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::profile::SubjectProfile;

/// 创建扫描请求数据传输对象
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateJobRequestDto {
    /// 扫描对象资料
    #[validate(nested)]
    pub profile: SubjectProfile,
}

/// 创建扫描响应
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponseDto {
    pub job_id: Uuid,
}
