//! 덮어쓰기 전 백업 보관소
//!
//! 실행(run)마다 `backups/<timestamp>/` 폴더 하나를 쓰며, 이전 실행의 백업과
//! 섞이지 않는다. 보관된 파일은 `manifest.json` 에 원래 경로와 SHA-256 이
//! 기록되어 수동 롤백에 쓰인다.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Failed to create backup: {0}")]
    BackupCreate(String),
    #[error("Backup manifest is unreadable: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("No backup run named {0}")]
    UnknownRun(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    /// 덮어쓰기 전 파일 위치
    pub original: PathBuf,
    /// 보관소 안의 사본
    pub stored: PathBuf,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub run: String,
    pub created_at: DateTime<Local>,
    pub entries: Vec<BackupEntry>,
}

/// 한 번의 배포 실행에 속한 백업 보관소.
///
/// 폴더는 첫 백업 시점에 만들어진다. 같은 이름의 폴더가 이미 있으면
/// `<label>_2`, `<label>_3` … 으로 새 폴더를 잡는다.
#[derive(Debug)]
pub struct BackupVault {
    backups_root: PathBuf,
    label: String,
    run_dir: Option<PathBuf>,
    manifest: Option<BackupManifest>,
}

impl BackupVault {
    pub fn new(backups_root: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            backups_root: backups_root.into(),
            label: label.into(),
            run_dir: None,
            manifest: None,
        }
    }

    /// 이 실행의 백업 폴더 (아직 백업이 없으면 None)
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    pub fn count(&self) -> usize {
        self.manifest.as_ref().map(|m| m.entries.len()).unwrap_or(0)
    }

    pub fn entries(&self) -> &[BackupEntry] {
        self.manifest
            .as_ref()
            .map(|m| m.entries.as_slice())
            .unwrap_or(&[])
    }

    /// `existing` 의 사본을 보관소에 넣고 사본 경로를 돌려준다.
    pub fn preserve(&mut self, existing: &Path) -> Result<PathBuf, BackupError> {
        let file_name = existing
            .file_name()
            .ok_or_else(|| {
                BackupError::BackupCreate(format!("{} has no file name", existing.display()))
            })?
            .to_string_lossy()
            .into_owned();

        let run_dir = self.ensure_run_dir()?;
        let stored = unique_child(&run_dir, &file_name);

        let content = fs::read(existing)
            .map_err(|err| BackupError::BackupCreate(format!("{}: {}", existing.display(), err)))?;
        fs::write(&stored, &content)
            .map_err(|err| BackupError::BackupCreate(format!("{}: {}", stored.display(), err)))?;

        let entry = BackupEntry {
            original: existing.to_path_buf(),
            stored: stored.clone(),
            sha256: sha256_hex(&content),
            size: content.len() as u64,
        };

        let manifest = self.manifest.get_or_insert_with(|| BackupManifest {
            run: run_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            created_at: Local::now(),
            entries: Vec::new(),
        });
        manifest.entries.push(entry);
        write_manifest(&run_dir, manifest)?;

        log::debug!("backed up {} to {}", existing.display(), stored.display());
        Ok(stored)
    }

    fn ensure_run_dir(&mut self) -> Result<PathBuf, BackupError> {
        if let Some(dir) = &self.run_dir {
            return Ok(dir.clone());
        }

        fs::create_dir_all(&self.backups_root)?;
        let mut attempt = 1;
        loop {
            let name = if attempt == 1 {
                self.label.clone()
            } else {
                format!("{}_{}", self.label, attempt)
            };
            let candidate = self.backups_root.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    self.run_dir = Some(candidate.clone());
                    return Ok(candidate);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(BackupError::BackupCreate(err.to_string())),
            }
        }
    }
}

/// `dir/name` 이 이미 있으면 `name.1`, `name.2` … 중 빈 이름
fn unique_child(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{name}.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn write_manifest(run_dir: &Path, manifest: &BackupManifest) -> Result<(), BackupError> {
    let content = serde_json::to_vec_pretty(manifest)?;
    fs::write(run_dir.join(MANIFEST_FILE), content)?;
    Ok(())
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

pub fn read_manifest(run_dir: &Path) -> Result<BackupManifest, BackupError> {
    let content = fs::read(run_dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_slice(&content)?)
}

/// 백업 실행 폴더 이름 목록 (오래된 순)
pub fn list_runs(backups_root: &Path) -> Result<Vec<String>, BackupError> {
    if !backups_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in fs::read_dir(backups_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && entry.path().join(MANIFEST_FILE).is_file() {
            runs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    runs.sort();
    Ok(runs)
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub restored: Vec<PathBuf>,
    /// 사본의 해시가 매니페스트와 다른 항목 (복원하지 않음)
    pub corrupted: Vec<PathBuf>,
}

/// 매니페스트에 기록된 파일들을 원래 위치로 되돌린다.
///
/// 같은 원본이 여러 번 기록되어 있으면 가장 먼저 보관된 사본(실행 전 상태)을 쓴다.
pub fn restore_run(backups_root: &Path, run: &str) -> Result<RestoreOutcome, BackupError> {
    // 실행 이름은 backups 바로 아래 폴더 하나만 가리킬 수 있다
    let mut components = Path::new(run).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(BackupError::UnknownRun(run.to_string()));
    }

    let run_dir = backups_root.join(run);
    if !run_dir.is_dir() {
        return Err(BackupError::UnknownRun(run.to_string()));
    }
    let manifest = read_manifest(&run_dir)?;

    let mut outcome = RestoreOutcome::default();
    for entry in &manifest.entries {
        if outcome.restored.contains(&entry.original)
            || outcome.corrupted.contains(&entry.original)
        {
            continue;
        }

        let content = fs::read(&entry.stored)?;
        if sha256_hex(&content) != entry.sha256 {
            log::warn!("backup {} does not match its digest, skipped", entry.stored.display());
            outcome.corrupted.push(entry.original.clone());
            continue;
        }

        swap_in(&entry.stored, &entry.original)?;
        outcome.restored.push(entry.original.clone());
    }

    log::info!("restored {} files from backup run {}", outcome.restored.len(), run);
    Ok(outcome)
}

/// `source` 를 임시 파일로 복사한 뒤 `target` 으로 rename 한다.
///
/// 대상 파일은 항상 이전 내용이거나 완전한 새 내용이다.
pub fn swap_in(source: &Path, target: &Path) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = build_temp_path(target);
    let copied = fs::copy(source, &temp_path)?;
    File::open(&temp_path)?.sync_all()?;

    #[cfg(target_os = "windows")]
    {
        if let Err(err) = fs::rename(&temp_path, target) {
            if err.kind() == io::ErrorKind::AlreadyExists || target.exists() {
                fs::remove_file(target)?;
                fs::rename(&temp_path, target)?;
            } else {
                let _ = fs::remove_file(&temp_path);
                return Err(err);
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Err(err) = fs::rename(&temp_path, target) {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    }

    Ok(copied)
}

fn build_temp_path(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let pid = std::process::id();
    let suffix = format!("__tmp__pid_{}", pid);
    match temp.file_name() {
        Some(name) => {
            let mut os_string = name.to_os_string();
            os_string.push(suffix);
            temp.set_file_name(os_string);
        }
        None => {
            temp.push(format!("temp_{pid}"));
        }
    }
    temp
}
