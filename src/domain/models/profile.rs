// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 扫描对象资料
///
/// 一次扫描针对的个人资料，各数据源的任务都由它生成，
/// 并作为任务负载原样传递给站点能力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProfile {
    /// 名
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    /// 姓
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    /// 城市
    #[validate(custom(function = "not_blank"))]
    pub city: String,
    /// 州
    #[validate(custom(function = "not_blank"))]
    pub state: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl SubjectProfile {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            city: city.into(),
            state: state.into(),
        }
    }

    /// 按模板占位符名称取字段值
    pub fn field(&self, placeholder: &str) -> Option<&str> {
        match placeholder {
            "firstName" => Some(&self.first_name),
            "lastName" => Some(&self.last_name),
            "city" => Some(&self.city),
            "state" => Some(&self.state),
            _ => None,
        }
    }
}
