// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Sync Engine: the per-account incremental fetch loop the Job Orchestrator's sync
//! queue drives. Generic over the wire backend via [`provider_handle::ProviderHandle`].

pub mod engine;
pub mod provider_handle;

pub use engine::run_account;
pub use provider_handle::ProviderHandle;
