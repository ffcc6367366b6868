// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

/// Broad recovery category an [`ErrorCode`] belongs to.
///
/// Mirrors the taxonomy the sync engine and job orchestrator use to decide
/// whether to retry, skip a single message, or abandon a job outright.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Worth retrying with backoff: the network blinked, a pool timed out, the
    /// server asked us to slow down.
    Transient,
    /// The server answered but not the way the protocol promises (bad UID
    /// validity, a FETCH missing the fields we asked for, a malformed page).
    ProviderMisbehavior,
    /// Scoped to one message; the rest of the mailbox should keep going.
    PermanentPerMessage,
    /// Nothing short of operator intervention will fix this.
    Irrecoverable,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side / configuration errors (10000-10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10020,
    ExceedsLimitation = 10040,

    // Resource errors (30000-30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,
    TooManyRequest = 30020,

    // Network / transport errors (40000-40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,
    ConnectionPoolTimeout = 40020,
    HttpResponseError = 40030,

    // IMAP adapter errors (50000-50999)
    ImapCommandFailed = 50000,
    ImapAuthenticationFailed = 50010,
    ImapUnexpectedResult = 50020,
    ImapCapabilityMissing = 50030,
    Incompatible = 50040,

    // Graph adapter errors (51000-51999)
    GraphApiCallFailed = 51000,
    GraphAuthenticationFailed = 51010,
    GraphThrottled = 51020,

    // Normalizer / importer errors (52000-52999)
    MessageParseFailed = 52000,
    MboxParseFailed = 52010,
    AttachmentExtractionFailed = 52020,

    // Store gateway errors (60000-60999)
    StoreError = 60000,
    SearchQueryInvalid = 60010,

    // Job orchestrator errors (61000-61999)
    JobNotFound = 61000,
    JobAlreadyRunning = 61010,
    JobCancelled = 61020,

    // Account errors (62000-62999)
    AccountDisabled = 62000,

    // Internal system errors (70000-70999)
    InternalError = 70000,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::NetworkError
            | ErrorCode::ConnectionTimeout
            | ErrorCode::ConnectionPoolTimeout
            | ErrorCode::TooManyRequest
            | ErrorCode::GraphThrottled => ErrorKind::Transient,

            ErrorCode::ImapUnexpectedResult
            | ErrorCode::ImapCapabilityMissing
            | ErrorCode::HttpResponseError
            | ErrorCode::GraphApiCallFailed => ErrorKind::ProviderMisbehavior,

            ErrorCode::MessageParseFailed
            | ErrorCode::MboxParseFailed
            | ErrorCode::AttachmentExtractionFailed
            | ErrorCode::SearchQueryInvalid => ErrorKind::PermanentPerMessage,

            ErrorCode::InvalidParameter
            | ErrorCode::MissingConfiguration
            | ErrorCode::ExceedsLimitation
            | ErrorCode::ResourceNotFound
            | ErrorCode::AlreadyExists
            | ErrorCode::ImapCommandFailed
            | ErrorCode::ImapAuthenticationFailed
            | ErrorCode::Incompatible
            | ErrorCode::GraphAuthenticationFailed
            | ErrorCode::StoreError
            | ErrorCode::JobNotFound
            | ErrorCode::JobAlreadyRunning
            | ErrorCode::JobCancelled
            | ErrorCode::AccountDisabled
            | ErrorCode::InternalError => ErrorKind::Irrecoverable,
        }
    }
}
