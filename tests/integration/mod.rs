// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod helpers;
pub mod job_api_test;
pub mod persistence_flow_test;
pub mod pool_api_test;
