// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeEntry {
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEntry {
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEntry {
    pub email: String,
}

/// 单条记录
///
/// 数据源结果页上的一行，对应一个人
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub names: Vec<NameEntry>,
    pub ages: Vec<AgeEntry>,
    pub addresses: Vec<AddressEntry>,
    pub phones: Vec<PhoneEntry>,
    pub emails: Vec<EmailEntry>,
    pub relatives: Vec<NameEntry>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.ages.is_empty()
            && self.addresses.is_empty()
            && self.phones.is_empty()
            && self.emails.is_empty()
            && self.relatives.is_empty()
    }
}

/// 站点结果
///
/// 一个任务成功时的结构化结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteResults {
    /// 实际结果页地址
    pub url: String,
    pub listings: Vec<Listing>,
}
