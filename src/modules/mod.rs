// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod account;
pub mod archive;
pub mod common;
pub mod context;
pub mod database;
pub mod error;
pub mod export;
pub mod graph;
pub mod imap;
pub mod import;
pub mod jobs;
pub mod logger;
pub mod mime;
pub mod normalizer;
pub mod provider;
pub mod search;
pub mod settings;
pub mod store;
pub mod sync;
pub mod utils;
