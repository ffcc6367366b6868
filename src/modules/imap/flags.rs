// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum EnvelopeFlags {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    MayCreate,
    Custom(String),
}

impl EnvelopeFlags {
    pub fn to_imap_flag(&self) -> String {
        match self {
            EnvelopeFlags::Seen => "\\Seen".into(),
            EnvelopeFlags::Answered => "\\Answered".into(),
            EnvelopeFlags::Flagged => "\\Flagged".into(),
            EnvelopeFlags::Deleted => "\\Deleted".into(),
            EnvelopeFlags::Draft => "\\Draft".into(),
            EnvelopeFlags::Recent => "\\Recent".into(),
            EnvelopeFlags::MayCreate => "\\*".into(),
            EnvelopeFlags::Custom(flag) => flag.clone(),
        }
    }
}
