// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod cli;
pub mod dir;
pub mod proxy;
pub mod timezone;
