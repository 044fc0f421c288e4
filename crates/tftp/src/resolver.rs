//! File resolution
//!
//! The engine never touches the filesystem directly. A [`FileResolver`] maps the
//! filename of a read request to a sequential byte source and its size.
//! [`RootDirResolver`] serves regular files below a root directory.

use std::fs::File;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;

/// What a resolver gets to decide on.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub filename: &'a str,
    /// Requesting client. Resolvers may use it to serve per-client content.
    pub client: SocketAddr,
}

/// A readable file and its total size in bytes.
pub struct ResolvedFile {
    pub size: u64,
    pub reader: Box<dyn Read + Send>,
}

impl ResolvedFile {
    pub fn new(size: u64, reader: impl Read + Send + 'static) -> Self {
        Self {
            size,
            reader: Box::new(reader),
        }
    }
}

impl std::fmt::Debug for ResolvedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFile").field("size", &self.size).finish()
    }
}

/// Maps requested filenames to content.
pub trait FileResolver: Send + Sync {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<ResolvedFile, ResolveError>;
}

/// Serves regular files confined to a root directory.
#[derive(Debug, Clone)]
pub struct RootDirResolver {
    root: PathBuf,
}

impl RootDirResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileResolver for RootDirResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<ResolvedFile, ResolveError> {
        let path = validate_file_path(&self.root, request.filename)?;

        let file = File::open(&path).map_err(|e| io_error(request.filename, e))?;
        let metadata = file.metadata().map_err(|e| io_error(request.filename, e))?;
        if !metadata.is_file() {
            return Err(ResolveError::NotFound(request.filename.to_string()));
        }

        tracing::debug!("Resolved '{}' to {} ({} bytes)", request.filename, path.display(), metadata.len());
        Ok(ResolvedFile::new(metadata.len(), file))
    }
}

fn io_error(filename: &str, error: io::Error) -> ResolveError {
    match error.kind() {
        io::ErrorKind::NotFound => ResolveError::NotFound(filename.to_string()),
        io::ErrorKind::PermissionDenied => ResolveError::AccessDenied(filename.to_string()),
        _ => ResolveError::Io {
            path: filename.to_string(),
            source: error,
        },
    }
}

/// Validate file path and check for path traversal attacks
fn validate_file_path(root: impl AsRef<Path>, filename: &str) -> Result<PathBuf, ResolveError> {
    // Boot ROMs commonly ask for "/pxelinux.0"; treat it as relative to the root.
    let relative = filename.trim_start_matches('/');
    if relative.is_empty() {
        return Err(ResolveError::NotFound(filename.to_string()));
    }

    let root_canon = root.as_ref().canonicalize().map_err(|e| io_error(filename, e))?;
    let path_canon = root
        .as_ref()
        .join(relative)
        .canonicalize()
        .map_err(|e| io_error(filename, e))?;

    if !path_canon.starts_with(&root_canon) {
        tracing::warn!("Path traversal attempt detected: '{}'", filename);
        return Err(ResolveError::AccessDenied(filename.to_string()));
    }

    Ok(path_canon)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use tempfile::tempdir;

    use super::*;

    fn request(filename: &str) -> ResolveRequest<'_> {
        ResolveRequest {
            filename,
            client: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000),
        }
    }

    #[test]
    fn test_validate_file_path() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_path_buf();

        let test_file = root.join("test.txt");
        std::fs::write(&test_file, b"test content").unwrap();

        let result = validate_file_path(&root, "test.txt");
        assert_eq!(result.unwrap(), test_file.canonicalize().unwrap());

        let result = validate_file_path(&root, "/test.txt");
        assert_eq!(result.unwrap(), test_file.canonicalize().unwrap());
    }

    #[test]
    fn test_traversal_is_access_violation() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret"), b"nope").unwrap();

        let resolver = RootDirResolver::new(&root);
        let err = resolver.resolve(&request("../secret")).unwrap_err();
        assert!(matches!(err, ResolveError::AccessDenied(_)));
    }

    #[test]
    fn test_resolve_reads_file() {
        let temp_dir = tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("boot")).unwrap();
        std::fs::write(temp_dir.path().join("boot/kernel"), vec![7u8; 1000]).unwrap();

        let resolver = RootDirResolver::new(temp_dir.path());
        let mut resolved = resolver.resolve(&request("boot/kernel")).unwrap();
        assert_eq!(resolved.size, 1000);

        let mut content = Vec::new();
        resolved.reader.read_to_end(&mut content).unwrap();
        assert_eq!(content, vec![7u8; 1000]);
    }

    #[test]
    fn test_missing_and_directories_are_not_found() {
        let temp_dir = tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("dir")).unwrap();
        let resolver = RootDirResolver::new(temp_dir.path());

        assert!(matches!(
            resolver.resolve(&request("missing.bin")),
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(resolver.resolve(&request("dir")), Err(ResolveError::NotFound(_))));
        assert!(matches!(resolver.resolve(&request("/")), Err(ResolveError::NotFound(_))));
    }
}
