//! Plain-SQL migration runner
//!
//! Applies `*.sql` files from a folder in filename order. Each file runs in its
//! own transaction and is recorded in `applied_migrations` with a SHA-256
//! checksum of its contents.

use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{MigrationError, NziResult};

/// Outcome of one runner pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// Applied files whose contents changed since they were recorded
    pub checksum_mismatches: Vec<String>,
}

/// A migration file read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub filename: String,
    pub sql: String,
    pub checksum: String,
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// `*.sql` files in `dir`, sorted by file name
pub fn migration_files(dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    if !dir.is_dir() {
        return Err(MigrationError::FolderNotFound(dir.display().to_string()));
    }

    let entries = std::fs::read_dir(dir).map_err(|source| MigrationError::Read {
        file: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    paths.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

    paths
        .into_iter()
        .map(|path| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let sql = std::fs::read_to_string(&path).map_err(|source| MigrationError::Read {
                file: filename.clone(),
                source,
            })?;
            let checksum = sha256_hex(&sql);
            Ok(MigrationFile {
                filename,
                sql,
                checksum,
            })
        })
        .collect()
}

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS public.applied_migrations (
                   filename TEXT PRIMARY KEY,
                   checksum TEXT NOT NULL,
                   applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
               )"#,
        )
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    async fn recorded_checksums(&self) -> Result<HashMap<String, String>, sqlx::Error> {
        let rows = sqlx::query("SELECT filename, checksum FROM public.applied_migrations")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("filename"), row.get("checksum")))
            .collect())
    }

    async fn apply_one(&self, file: &MigrationFile) -> Result<(), MigrationError> {
        let apply_err = |source| MigrationError::Apply {
            file: file.filename.clone(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(apply_err)?;
        // raw_sql permits multiple statements per file
        sqlx::raw_sql(&file.sql)
            .execute(&mut *tx)
            .await
            .map_err(apply_err)?;
        sqlx::query("INSERT INTO public.applied_migrations (filename, checksum) VALUES ($1, $2)")
            .bind(&file.filename)
            .bind(&file.checksum)
            .execute(&mut *tx)
            .await
            .map_err(apply_err)?;
        tx.commit().await.map_err(apply_err)?;
        Ok(())
    }

    /// Apply every file in `dir` not yet recorded in the ledger
    pub async fn apply_dir(&self, dir: &Path) -> NziResult<MigrationReport> {
        let files = migration_files(dir)?;
        self.ensure_ledger().await?;
        let recorded = self.recorded_checksums().await?;

        let mut report = MigrationReport::default();
        for file in &files {
            if let Some(checksum) = recorded.get(&file.filename) {
                if *checksum != file.checksum {
                    warn!(
                        file = %file.filename,
                        "applied migration changed on disk since it was recorded"
                    );
                    report.checksum_mismatches.push(file.filename.clone());
                }
                report.skipped.push(file.filename.clone());
                continue;
            }

            self.apply_one(file).await?;
            info!(file = %file.filename, "applied migration");
            report.applied.push(file.filename.clone());
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "migrations complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0002_targets.sql"), "SELECT 2;").unwrap();
        std::fs::write(dir.path().join("0001_initial.sql"), "SELECT 1;").unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();
        std::fs::create_dir(dir.path().join("0003_dir.sql")).unwrap();

        let files = migration_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["0001_initial.sql", "0002_targets.sql"]);
        assert_eq!(files[0].checksum, sha256_hex("SELECT 1;"));
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = migration_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, MigrationError::FolderNotFound(_)));
    }

    #[test]
    fn test_bundled_migrations_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        let files = migration_files(&dir).unwrap();
        assert!(!files.is_empty());
        assert!(files[0].sql.contains("crp_scope_entries"));
    }
}
