//! ZIP 아카이브 처리 모듈
//!
//! 업로드된 번역 아카이브를 실행마다 고유한 임시 디렉터리에 풀고,
//! 내보내기용 평탄화(flatten) 아카이브를 만드는 기능을 제공합니다.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::read::ZipArchive;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::classifier::archive_relative_path;
use crate::time::RunStamp;

/// 아카이브 처리 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Please upload a valid ZIP file: {0}")]
    Upload(String),

    #[error("Failed to extract archive: {0}")]
    Extraction(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// 아카이브 파일인지 확인 (확장자 기준)
pub fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// 업로드된 아카이브
#[derive(Debug, Clone)]
pub struct Upload {
    /// 클라이언트가 보낸 원본 파일명
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> ArchiveResult<Self> {
        let bytes = fs::read(path).map_err(|err| {
            ArchiveError::Upload(format!("{}: {}", path.display(), err))
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// 빈 업로드나 ZIP이 아닌 파일명을 거부
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.bytes.is_empty() {
            return Err(ArchiveError::Upload("uploaded file is empty".into()));
        }
        if !is_archive_file(Path::new(&self.filename)) {
            return Err(ArchiveError::Upload(format!(
                "'{}' is not a .zip archive",
                self.filename
            )));
        }
        Ok(())
    }
}

/// 임시 디렉터리에 풀린 파일 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// 임시 디렉터리 안의 절대 경로
    pub path: PathBuf,
    /// 아카이브 내부 경로 (예: "Theme/it-IT/ShopTheme.xlf")
    pub relative_path: String,
    pub filename: String,
    /// 확장자가 없으면 빈 문자열
    pub extension: String,
}

/// 실행 단위 임시 디렉터리. Drop 시 항상 삭제된다.
#[derive(Debug)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    /// `<tmp_root>/<stamp>_<nonce>` 를 새로 만든다. 이미 있으면 실패.
    pub fn create(tmp_root: &Path, stamp: &RunStamp) -> ArchiveResult<Self> {
        fs::create_dir_all(tmp_root).map_err(|err| {
            ArchiveError::Extraction(format!(
                "could not create temporary root {}: {}",
                tmp_root.display(),
                err
            ))
        })?;

        let root = tmp_root.join(stamp.scratch_name());
        fs::create_dir(&root).map_err(|err| {
            ArchiveError::Extraction(format!(
                "could not create temporary directory {}: {}",
                root.display(),
                err
            ))
        })?;

        // 생성 직후부터 가드가 소유하므로 이후 실패해도 정리된다
        let mut staging = Self { root };
        staging.root = dunce::canonicalize(&staging.root)?;
        Ok(staging)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 아카이브 바이트를 이 디렉터리에 푼다
    pub fn extract(&self, bytes: &[u8]) -> ArchiveResult<usize> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| ArchiveError::Extraction(format!("failed to open ZIP file: {err}")))?;

        let mut extracted = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|err| ArchiveError::Extraction(err.to_string()))?;

            // 루트 밖으로 나가는 경로(zip slip)는 건너뜀
            let Some(inner) = entry.enclosed_name() else {
                log::warn!("skipping archive entry outside extraction root: {}", entry.name());
                continue;
            };
            let out_path = self.root.join(inner);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file)
                .map_err(|err| ArchiveError::Extraction(format!("{}: {}", entry.name(), err)))?;
            extracted += 1;
        }

        Ok(extracted)
    }

    /// 풀린 파일 전체 (디렉터리 제외), 경로 순 정렬
    pub fn files(&self) -> ArchiveResult<Vec<StagedFile>> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files)?;
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.root) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "failed to remove temporary directory {}: {}",
                    self.root.display(),
                    err
                );
            }
        }
    }
}

fn collect_files(root: &Path, current: &Path, files: &mut Vec<StagedFile>) -> io::Result<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file() {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
                .to_string();
            files.push(StagedFile {
                relative_path: archive_relative_path(root, &path),
                path,
                filename,
                extension,
            });
        }
    }
    Ok(())
}

/// 업로드를 검증하고 새 임시 디렉터리에 푼다.
///
/// 반환된 [`StagingDir`] 가 drop 되면 디렉터리는 삭제된다.
pub fn stage_upload(
    upload: &Upload,
    tmp_root: &Path,
    stamp: &RunStamp,
) -> ArchiveResult<StagingDir> {
    upload.validate()?;
    let staging = StagingDir::create(tmp_root, stamp)?;
    let count = staging.extract(&upload.bytes)?;
    log::info!(
        "extracted {} entries from {} into {}",
        count,
        upload.filename,
        staging.root().display()
    );
    Ok(staging)
}

/// 파일들을 하위 디렉터리 없이 하나의 ZIP으로 묶는다.
///
/// 이름이 같은 파일은 먼저 나온 것만 들어가며, 실제로 담긴 엔트리 이름을 반환한다.
pub fn pack_flat(files: &[PathBuf], output_path: &Path) -> ArchiveResult<Vec<String>> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let output_file = File::create(output_path)?;
    let mut writer = ZipWriter::new(output_file);

    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut written: Vec<String> = Vec::new();
    for path in files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if written.contains(&name) {
            log::warn!("duplicate file name {} skipped: {}", name, path.display());
            continue;
        }

        let content = fs::read(path)?;
        writer.start_file(name.as_str(), options.clone())?;
        writer.write_all(&content)?;
        written.push(name);
    }

    writer.finish()?;
    Ok(written)
}
