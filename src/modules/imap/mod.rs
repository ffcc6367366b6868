// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod adapter;
pub mod capabilities;
pub mod client;
pub mod executor;
pub mod flags;
pub mod manager;
pub mod pool;
pub mod session;

pub mod decoder;
pub mod section;
