// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::domain::models::site_results::{
    AddressEntry, AgeEntry, EmailEntry, Listing, NameEntry, PhoneEntry, SiteResults,
};
use crate::engines::traits::InvocationError;

/// 结果页的 CSS 选择器配置
///
/// 字段选择器相对于 `listing` 选中的每一行求值，空字符串表示该字段不提取
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// 结果页就绪的标志元素，出现之前不提取
    pub ready: Option<String>,
    pub listing: String,
    pub name: String,
    pub age: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub relative: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            ready: None,
            listing: ".card, .result".to_string(),
            name: ".name".to_string(),
            age: ".age".to_string(),
            address: ".address".to_string(),
            phone: ".phone".to_string(),
            email: ".email".to_string(),
            relative: ".relative".to_string(),
        }
    }
}

/// 基于 CSS 选择器的结果提取器
#[derive(Debug)]
pub struct SelectorExtractor {
    ready: Option<String>,
    listing: Selector,
    name: Option<Selector>,
    age: Option<Selector>,
    address: Option<Selector>,
    phone: Option<Selector>,
    email: Option<Selector>,
    relative: Option<Selector>,
}

fn parse(selector: &str) -> Result<Selector, InvocationError> {
    Selector::parse(selector)
        .map_err(|e| InvocationError::Extraction(format!("invalid selector '{}': {}", selector, e)))
}

fn parse_optional(selector: &str) -> Result<Option<Selector>, InvocationError> {
    if selector.trim().is_empty() {
        return Ok(None);
    }
    parse(selector).map(Some)
}

fn texts(row: ElementRef<'_>, selector: &Option<Selector>) -> Vec<String> {
    let Some(selector) = selector else {
        return Vec::new();
    };
    row.select(selector)
        .map(|element| element.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect()
}

impl SelectorExtractor {
    /// 编译选择器
    ///
    /// # 返回值
    ///
    /// * `Ok(SelectorExtractor)` - 提取器
    /// * `Err(InvocationError::Extraction)` - 存在无法解析的选择器
    pub fn new(selectors: &ListingSelectors) -> Result<Self, InvocationError> {
        if let Some(ready) = &selectors.ready {
            parse(ready)?;
        }
        Ok(Self {
            ready: selectors.ready.clone(),
            listing: parse(&selectors.listing)?,
            name: parse_optional(&selectors.name)?,
            age: parse_optional(&selectors.age)?,
            address: parse_optional(&selectors.address)?,
            phone: parse_optional(&selectors.phone)?,
            email: parse_optional(&selectors.email)?,
            relative: parse_optional(&selectors.relative)?,
        })
    }

    pub fn ready_selector(&self) -> Option<&str> {
        self.ready.as_deref()
    }

    /// 从结果页HTML中提取记录
    ///
    /// 没有任何字段的行会被丢弃；没有匹配行时返回空列表而非错误
    pub fn extract(&self, url: &str, html: &str) -> SiteResults {
        let document = Html::parse_document(html);

        let listings = document
            .select(&self.listing)
            .map(|row| Listing {
                names: texts(row, &self.name)
                    .into_iter()
                    .map(|name| NameEntry { name })
                    .collect(),
                ages: texts(row, &self.age)
                    .into_iter()
                    .map(|age| AgeEntry { age })
                    .collect(),
                addresses: texts(row, &self.address)
                    .into_iter()
                    .map(|address| AddressEntry { address })
                    .collect(),
                phones: texts(row, &self.phone)
                    .into_iter()
                    .map(|phone| PhoneEntry { phone })
                    .collect(),
                emails: texts(row, &self.email)
                    .into_iter()
                    .map(|email| EmailEntry { email })
                    .collect(),
                relatives: texts(row, &self.relative)
                    .into_iter()
                    .map(|name| NameEntry { name })
                    .collect(),
            })
            .filter(|listing| !listing.is_empty())
            .collect();

        SiteResults {
            url: url.to_string(),
            listings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="card">
            <h2 class="name">Jane   Doe</h2>
            <span class="age">Age 42</span>
            <div class="address">12 Main St, Chicago, IL</div>
            <div class="phone">(312) 555-0100</div>
            <div class="phone">(312) 555-0199</div>
            <a class="relative">John Doe</a>
          </div>
          <div class="card">
            <h2 class="name">Jane A Doe</h2>
            <div class="email">jane@example.com</div>
          </div>
          <div class="card"><span class="ad">Sponsored</span></div>
        </body></html>
    "#;

    #[test]
    fn test_extract_listings_with_default_selectors() {
        let extractor = SelectorExtractor::new(&ListingSelectors::default()).unwrap();
        let results = extractor.extract("https://example.com/people/jane-doe", RESULTS_PAGE);

        assert_eq!(results.url, "https://example.com/people/jane-doe");
        assert_eq!(results.listings.len(), 2);

        let first = &results.listings[0];
        assert_eq!(first.names[0].name, "Jane Doe");
        assert_eq!(first.ages[0].age, "Age 42");
        assert_eq!(first.phones.len(), 2);
        assert_eq!(first.relatives[0].name, "John Doe");
        assert!(first.emails.is_empty());

        assert_eq!(results.listings[1].emails[0].email, "jane@example.com");
    }

    #[test]
    fn test_blank_field_selector_is_skipped() {
        let selectors = ListingSelectors {
            phone: String::new(),
            ..Default::default()
        };
        let extractor = SelectorExtractor::new(&selectors).unwrap();
        let results = extractor.extract("https://example.com", RESULTS_PAGE);

        assert!(results.listings.iter().all(|l| l.phones.is_empty()));
    }

    #[test]
    fn test_no_matching_rows_is_empty_not_error() {
        let extractor = SelectorExtractor::new(&ListingSelectors::default()).unwrap();
        let results = extractor.extract("https://example.com", "<html><p>No records found</p></html>");
        assert!(results.listings.is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let selectors = ListingSelectors {
            listing: "div[".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SelectorExtractor::new(&selectors),
            Err(InvocationError::Extraction(_))
        ));
    }
}
