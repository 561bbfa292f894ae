// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod browser_capability;
pub mod listing_extractor;
pub mod registry;
pub mod traits;

pub use registry::CapabilityRegistry;
pub use traits::{CrawlerCapability, InvocationError};
