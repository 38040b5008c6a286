use crate::archive::{stage_upload, ArchiveError, Upload};
use crate::backup::BackupVault;
use crate::classifier::{Classifier, TargetMode};
use crate::context::{is_valid_locale, OperationContext};
use crate::distributor::{distribute, DistributionReport};
use crate::time::RunStamp;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Invalid language code: {0:?}")]
    InvalidLocale(String),

    #[error("Language {0} is not installed on this shop")]
    UnknownLanguage(String),
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub upload: Upload,
    pub mode: TargetMode,
    pub iso_code: String,
}

/// Extracts the uploaded archive and distributes its translation files.
///
/// The temporary extraction directory is removed before this returns, whether
/// distribution succeeded or not.
pub fn import_archive(
    ctx: &OperationContext,
    request: &ImportRequest,
) -> Result<DistributionReport, ImportError> {
    let iso_code = request.iso_code.as_str();
    if !is_valid_locale(iso_code) {
        return Err(ImportError::InvalidLocale(iso_code.to_string()));
    }
    if !ctx.languages.accepts_locale(iso_code) {
        return Err(ImportError::UnknownLanguage(iso_code.to_string()));
    }

    let stamp = RunStamp::now();
    let staging = stage_upload(&request.upload, &ctx.paths.tmp_root(), &stamp)?;
    let files = staging.files()?;

    let classifier = Classifier::for_context(ctx);
    let mut vault = BackupVault::new(ctx.paths.backups_root(), stamp.label.clone());
    log::info!(
        "importing {} staged files as {} for {} (core layout: {:?})",
        files.len(),
        request.mode,
        iso_code,
        classifier.layout()
    );

    let report = distribute(&files, request.mode, iso_code, &classifier, &mut vault);
    drop(staging);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_bytes;
    use crate::context::{Language, LanguageCatalog, RootPaths};
    use std::fs;
    use tempfile::tempdir;

    fn context(root: &std::path::Path) -> OperationContext {
        OperationContext::new(
            "classic",
            RootPaths::new(root.join("shop"), root.join("module")),
        )
    }

    #[test]
    fn rejects_bad_locale_before_touching_disk() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = ImportRequest {
            upload: Upload::new("pack.zip", zip_bytes(&[("a.xlf", b"a")])),
            mode: TargetMode::Theme,
            iso_code: "../../etc".into(),
        };
        assert!(matches!(
            import_archive(&ctx, &request),
            Err(ImportError::InvalidLocale(_))
        ));
        assert!(!ctx.paths.tmp_root().exists());
    }

    #[test]
    fn rejects_language_missing_from_catalog() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path()).with_languages(LanguageCatalog::new(vec![Language {
            id: 1,
            iso_code: "it".into(),
            locale: "it-IT".into(),
            name: "Italiano".into(),
        }]));
        let request = ImportRequest {
            upload: Upload::new("pack.zip", zip_bytes(&[("a.xlf", b"a")])),
            mode: TargetMode::Theme,
            iso_code: "de-DE".into(),
        };
        assert!(matches!(
            import_archive(&ctx, &request),
            Err(ImportError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn upload_errors_surface() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = ImportRequest {
            upload: Upload::new("pack.zip", Vec::new()),
            mode: TargetMode::Auto,
            iso_code: "it-IT".into(),
        };
        assert!(matches!(
            import_archive(&ctx, &request),
            Err(ImportError::Archive(ArchiveError::Upload(_)))
        ));
    }

    #[test]
    fn removes_staging_after_success() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let request = ImportRequest {
            upload: Upload::new(
                "pack.zip",
                zip_bytes(&[("nested/ShopTheme.xlf", b"x"), ("nested/notes.md", b"y")]),
            ),
            mode: TargetMode::Auto,
            iso_code: "it-IT".into(),
        };

        let report = import_archive(&ctx, &request).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(fs::read_dir(ctx.paths.tmp_root()).unwrap().count(), 0);
        assert!(ctx
            .paths
            .theme_translations("classic", "it-IT")
            .join("ShopTheme.xlf")
            .exists());
    }

    #[test]
    fn removes_staging_when_a_copy_fails() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        // A plain file where the destination directory belongs.
        let destination = ctx.paths.theme_translations("classic", "it-IT");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, b"").unwrap();

        let request = ImportRequest {
            upload: Upload::new("pack.zip", zip_bytes(&[("ShopTheme.xlf", b"x")])),
            mode: TargetMode::Theme,
            iso_code: "it-IT".into(),
        };

        let report = import_archive(&ctx, &request).unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(fs::read_dir(ctx.paths.tmp_root()).unwrap().count(), 0);
        assert!(destination.is_file());
    }
}
