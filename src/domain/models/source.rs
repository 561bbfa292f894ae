// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 站点能力名称
///
/// 每个目标数据源对应一种站点能力。名称集合是封闭的，
/// 配置中出现未知名称时在加载阶段即报错。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invocation {
    #[serde(rename = "runSmartBackgroundCheck")]
    SmartBackgroundCheck,
    #[serde(rename = "runPeopleWhiz")]
    PeopleWhiz,
    #[serde(rename = "runWhitePages")]
    WhitePages,
}

impl Invocation {
    pub const ALL: [Invocation; 3] = [
        Invocation::SmartBackgroundCheck,
        Invocation::PeopleWhiz,
        Invocation::WhitePages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Invocation::SmartBackgroundCheck => "runSmartBackgroundCheck",
            Invocation::PeopleWhiz => "runPeopleWhiz",
            Invocation::WhitePages => "runWhitePages",
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Invocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Invocation::ALL
            .into_iter()
            .find(|invocation| invocation.as_str() == s)
            .ok_or(())
    }
}

/// 目标数据源
///
/// 任务规划所依据的数据源配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSource {
    /// 数据源标识
    pub id: String,
    /// 对应的站点能力
    pub invocation: Invocation,
    /// 目标地址模板，支持 `{firstName}` `{lastName}` `{city}` `{state}` 占位符
    pub url_template: String,
    /// 是否启用
    pub active: bool,
}
