//! Document sources feeding ingestion

use std::path::{Path, PathBuf};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use walkdir::WalkDir;

use crate::auth::{evaluate_token, StoredToken, TokenDecision, TokenStore};
use crate::error::{Error, Result};
use crate::types::{FileType, SourceDocument};

/// Anything that can hand a batch of named documents to ingestion
///
/// Implementations:
/// - `UploadedDocuments`: files received directly from the user
/// - `FolderSource`: files found under a local folder
/// - `DriveSource`: files downloaded from a remote drive with stored credentials
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the current batch of documents
    async fn fetch(&self) -> Result<Vec<SourceDocument>>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Documents already held in memory
#[derive(Debug, Clone, Default)]
pub struct UploadedDocuments {
    documents: Vec<SourceDocument>,
}

impl UploadedDocuments {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }

    pub fn push(&mut self, document: SourceDocument) {
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentSource for UploadedDocuments {
    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        Ok(self.documents.clone())
    }

    fn name(&self) -> &str {
        "upload"
    }
}

/// Files under a local folder, filtered by extension (PDF only by default)
#[derive(Debug, Clone)]
pub struct FolderSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["pdf".to_string()],
        }
    }

    /// Replace the accepted extensions (case-insensitive, without the dot)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Resolve `requested` (absolute, or relative to `root`) to a folder that
    /// lies inside `root` once symlinks and `..` are resolved
    pub async fn within(root: &Path, requested: &Path) -> Result<Self> {
        let allowed = tokio::fs::canonicalize(root).await.map_err(|e| {
            Error::Config(format!("folder root {} is not accessible: {}", root.display(), e))
        })?;

        let folder = tokio::fs::canonicalize(allowed.join(requested))
            .await
            .map_err(|_| {
                Error::load(
                    requested.display().to_string(),
                    "folder does not exist or is not a directory",
                )
            })?;

        if !folder.starts_with(&allowed) {
            tracing::warn!(requested = %requested.display(), "Folder outside ingestion root refused");
            return Err(Error::Forbidden(format!(
                "{} is outside the ingestion folder root",
                requested.display()
            )));
        }

        Ok(Self::new(folder))
    }

    /// Check that every extension names a loadable file type
    pub fn check_extensions<S: AsRef<str>>(extensions: &[S]) -> Result<()> {
        for extension in extensions {
            let extension = extension.as_ref().trim_start_matches('.');
            if FileType::from_extension(extension) == FileType::Unknown {
                return Err(Error::Config(format!("unsupported file extension '{}'", extension)));
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching file paths, sorted for a stable ingestion order
    fn scan(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .is_some_and(|ext| extensions.contains(&ext))
            })
            .collect();
        paths.sort();
        paths
    }

    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl DocumentSource for FolderSource {
    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        if !self.root.is_dir() {
            return Err(Error::load(
                self.root.display().to_string(),
                "folder does not exist or is not a directory",
            ));
        }

        let root = self.root.clone();
        let extensions = self.extensions.clone();
        let paths = tokio::task::spawn_blocking(move || Self::scan(&root, &extensions))
            .await
            .map_err(|e| Error::internal(format!("folder scan failed: {}", e)))?;

        tracing::info!(
            folder = %self.root.display(),
            files = paths.len(),
            "Scanned folder for documents"
        );

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let name = self.display_name(&path);
            match tokio::fs::read(&path).await {
                Ok(bytes) => documents.push(SourceDocument::new(name, bytes)),
                Err(e) => {
                    return Err(Error::load(name, format!("could not read file: {}", e)));
                }
            }
        }

        Ok(documents)
    }

    fn name(&self) -> &str {
        "folder"
    }
}

/// Remote drive holding documents, reached with an OAuth access token
#[async_trait]
pub trait RemoteDrive: Send + Sync {
    /// Exchange a refresh token for a new token
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken>;

    /// Download the documents visible to `access_token`
    async fn download(&self, access_token: &str) -> Result<Vec<SourceDocument>>;

    fn name(&self) -> &str;
}

/// Documents from a remote drive, authorized with the token in `tokens`
pub struct DriveSource {
    drive: Arc<dyn RemoteDrive>,
    tokens: Arc<dyn TokenStore>,
}

impl DriveSource {
    pub fn new(drive: Arc<dyn RemoteDrive>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { drive, tokens }
    }

    /// A usable access token, refreshing and persisting it when needed
    async fn access_token(&self) -> Result<String> {
        let stored = self.tokens.load()?;

        match evaluate_token(stored.as_ref(), Utc::now()) {
            TokenDecision::Valid(token) => Ok(token.access_token),
            TokenDecision::Refresh(refresh_token) => {
                let mut token = self.drive.refresh(&refresh_token).await?;
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token);
                }
                self.tokens.save(&token)?;
                tracing::info!(drive = self.drive.name(), "Refreshed drive credentials");
                Ok(token.access_token)
            }
            TokenDecision::Reauthenticate => Err(Error::load(
                self.drive.name(),
                "drive authorization required; sign in again",
            )),
        }
    }
}

#[async_trait]
impl DocumentSource for DriveSource {
    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let access_token = self.access_token().await?;
        let documents = self.drive.download(&access_token).await?;
        tracing::info!(
            drive = self.drive.name(),
            files = documents.len(),
            "Downloaded documents from drive"
        );
        Ok(documents)
    }

    fn name(&self) -> &str {
        self.drive.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_folder_keeps_only_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-1.5").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF-1.5").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.pdf"), b"%PDF-1.5").unwrap();

        let docs = FolderSource::new(dir.path()).fetch().await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "nested/c.pdf"]);
    }

    #[tokio::test]
    async fn test_folder_without_pdfs_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"# hi").unwrap();

        let docs = FolderSource::new(dir.path()).fetch().await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"# hi").unwrap();

        let docs = FolderSource::new(dir.path())
            .with_extensions([".md", "txt"])
            .fetch()
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        let err = FolderSource::new("/definitely/not/here").fetch().await.unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }

    #[tokio::test]
    async fn test_uploaded_documents_round_trip() {
        let mut uploads = UploadedDocuments::default();
        uploads.push(SourceDocument::new("x.pdf", b"data".to_vec()));
        assert_eq!(uploads.fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_within_accepts_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("manuals/2024")).unwrap();

        let source = FolderSource::within(dir.path(), Path::new("manuals/2024")).await.unwrap();
        assert!(source.root().ends_with("manuals/2024"));
    }

    #[tokio::test]
    async fn test_within_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shared");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(dir.path().join("private")).unwrap();

        let err = FolderSource::within(&root, Path::new("../private")).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = FolderSource::within(&root, &dir.path().join("private")).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shared");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("secret.pdf"), b"%PDF-1.5").unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret.pdf"), root.join("link.pdf")).unwrap();
        std::fs::write(root.join("own.pdf"), b"%PDF-1.5").unwrap();

        let docs = FolderSource::new(&root).fetch().await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["own.pdf"]);
    }

    #[test]
    fn test_extension_check() {
        assert!(FolderSource::check_extensions(&["pdf", ".md", "TXT"]).is_ok());
        assert!(matches!(
            FolderSource::check_extensions(&["pdf", "key"]),
            Err(Error::Config(_))
        ));
    }
}
