use crate::modules::context::Initialize;
use crate::modules::database::META_MODELS;
use crate::modules::error::{code::ErrorCode, RustMailerError};
use crate::modules::error::RustMailerResult;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use native_db::{Builder, Database};
use std::sync::{Arc, LazyLock};

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

/// Owns the embedded `native_db`/`redb` store that holds `MailAccount`,
/// `Proxy`, and `Job` records — ambient identity/config/bookkeeping, not the
/// full-text searchable archive (which lives in Postgres, see `store`).
pub struct DatabaseManager {
    meta_db: Arc<Database<'static>>,
}

impl DatabaseManager {
    fn new() -> Self {
        let meta_db = Self::init_meta_database().expect("Failed to initialize metadata database");
        DatabaseManager { meta_db }
    }

    pub fn meta_db(&self) -> &Arc<Database<'static>> {
        &self.meta_db
    }

    fn init_meta_database() -> RustMailerResult<Arc<Database<'static>>> {
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .rustmailer_metadata_cache_size
                    .unwrap_or(134217728)
                    .max(67108864),
            ) // default 128MB
            .create(&META_MODELS, DATA_DIR_MANAGER.meta_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn handle_database_error(error: native_db::db_type::Error) -> RustMailerError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "Database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("Database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("Failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> RustMailerResult<()> {
        LazyLock::force(&DB_MANAGER);
        Ok(())
    }
}
