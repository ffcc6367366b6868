// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Graph side of the [`crate::modules::provider::MailProvider`] contract: client-credentials
//! token acquisition plus a thin policy layer over Microsoft Graph's application
//! (`/users/{upn}/...`) surface.

pub mod adapter;
pub mod token;

pub use adapter::GraphProvider;
