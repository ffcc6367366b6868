// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::context::Initialize;
use crate::modules::settings::cli::SETTINGS;
use crate::{
    modules::error::{code::ErrorCode, RustMailerResult},
    raise_error,
};
use std::path::PathBuf;
use std::sync::LazyLock;

pub const META_FILE: &str = "meta.db";
const LOG_DIR: &str = "logs";
const EXPORTS_DIR: &str = "exports";
const UPLOADS_DIR: &str = "uploads";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> =
    LazyLock::new(|| DataDirManager::new(PathBuf::from(&SETTINGS.rustmailer_root_dir)));

/// Layout of the on-disk directory a archiver instance owns: the embedded
/// metadata database, rolling log files, and the job artifact directories
/// export/import jobs read and write through.
#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub meta_db: PathBuf,
    pub log_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub uploads_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> RustMailerResult<()> {
        for dir in [
            &DATA_DIR_MANAGER.root_dir,
            &DATA_DIR_MANAGER.log_dir,
            &DATA_DIR_MANAGER.exports_dir,
            &DATA_DIR_MANAGER.uploads_dir,
        ] {
            std::fs::create_dir_all(dir)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        }
        Ok(())
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            meta_db: root_dir.join(META_FILE),
            log_dir: root_dir.join(LOG_DIR),
            exports_dir: root_dir.join(EXPORTS_DIR),
            uploads_dir: root_dir.join(UPLOADS_DIR),
            root_dir,
        }
    }

    /// Path a job of the given id should write its export artifact under.
    pub fn export_path(&self, job_id: u64, file_name: &str) -> PathBuf {
        self.exports_dir.join(job_id.to_string()).join(file_name)
    }

    /// Path a job of the given id should stage its import source under.
    pub fn upload_path(&self, job_id: u64, file_name: &str) -> PathBuf {
        self.uploads_dir.join(job_id.to_string()).join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn derives_subdirectories_from_root() {
        let temp_dir = tempdir().unwrap();
        let manager = DataDirManager::new(temp_dir.path().to_path_buf());

        assert_eq!(manager.meta_db, temp_dir.path().join("meta.db"));
        assert_eq!(manager.log_dir, temp_dir.path().join("logs"));
        assert_eq!(manager.exports_dir, temp_dir.path().join("exports"));
        assert_eq!(manager.uploads_dir, temp_dir.path().join("uploads"));
    }

    #[test]
    fn export_and_upload_paths_are_scoped_by_job_id() {
        let temp_dir = tempdir().unwrap();
        let manager = DataDirManager::new(temp_dir.path().to_path_buf());

        let export = manager.export_path(42, "archive.zip");
        assert_eq!(
            export,
            temp_dir.path().join("exports").join("42").join("archive.zip")
        );

        let upload = manager.upload_path(7, "inbox.mbox");
        assert_eq!(
            upload,
            temp_dir.path().join("uploads").join("7").join("inbox.mbox")
        );
    }
}
