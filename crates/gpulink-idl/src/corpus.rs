use std::collections::HashMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::CorpusConfig;
use crate::error::{Result, SchemaError};
use crate::metadata::FileMetadata;

/// One schema source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFile {
    /// Path relative to the corpus root.
    pub path: PathBuf,
    pub text: String,
    pub metadata: FileMetadata,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self> {
        let path = normalize(&path.into());
        let text = text.into();
        let metadata = FileMetadata::parse(&text, &path)?;
        Ok(Self {
            path,
            text,
            metadata,
        })
    }

    /// File name without extension; names the generated artifacts.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// Every schema file under a root directory, in lexical path order.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: Option<PathBuf>,
    files: Vec<SchemaFile>,
    config: CorpusConfig,
}

impl Corpus {
    /// Load a corpus from a directory tree.
    pub fn from_directory(root: &Path) -> Result<Self> {
        Self::from_directory_with_config(root, CorpusConfig::default())
    }

    /// Load a corpus from a directory tree with explicit config.
    pub fn from_directory_with_config(root: &Path, config: CorpusConfig) -> Result<Self> {
        let mut paths = Vec::new();
        walk(root, root, &config, &mut paths)?;
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for relative in paths {
            let text = read_limited(&root.join(&relative), config.max_file_size)?;
            files.push(SchemaFile::new(relative, text)?);
        }
        debug!(root = %root.display(), files = files.len(), "loaded schema corpus");

        Self::build(Some(root.to_path_buf()), files, config)
    }

    /// Build a corpus from in-memory sources; paths are relative names.
    pub fn from_sources<I, P, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let mut files = sources
            .into_iter()
            .map(|(path, text)| SchemaFile::new(path, text))
            .collect::<Result<Vec<_>>>()?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self::build(None, files, CorpusConfig::default())
    }

    fn build(root: Option<PathBuf>, files: Vec<SchemaFile>, config: CorpusConfig) -> Result<Self> {
        if files.len() > config.max_files {
            return Err(SchemaError::Corpus(format!(
                "schema file count exceeds configured max ({}): {}",
                config.max_files,
                files.len()
            )));
        }

        let mut stems: HashMap<&str, &Path> = HashMap::new();
        for file in &files {
            if let Some(previous) = stems.insert(file.stem(), &file.path) {
                return Err(SchemaError::Corpus(format!(
                    "{} and {} would generate the same output file",
                    previous.display(),
                    file.path.display()
                )));
            }
        }

        Ok(Self {
            root,
            files,
            config,
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    pub fn get(&self, path: &Path) -> Option<&SchemaFile> {
        let path = normalize(path);
        self.files.iter().find(|file| file.path == path)
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Find an included file among the corpus files.
    ///
    /// An include that is not a corpus member is reported as missing, with
    /// the I/O error from probing the path under the root when there is one.
    pub fn load_include(&self, include: &str, from: &Path) -> Result<&SchemaFile> {
        let path = normalize(Path::new(include));
        if let Some(file) = self.get(&path) {
            return Ok(file);
        }

        let source = match &self.root {
            Some(root) => match std::fs::metadata(root.join(&path)) {
                Ok(_) => std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a .{} file of the corpus", self.config.extension),
                ),
                Err(err) => err,
            },
            None => std::io::Error::new(std::io::ErrorKind::NotFound, "not part of the corpus"),
        };
        Err(SchemaError::MissingInclude {
            path,
            from: from.to_path_buf(),
            source,
        })
    }
}

fn walk(root: &Path, dir: &Path, config: &CorpusConfig, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| SchemaError::Load {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| SchemaError::Load {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| SchemaError::Load {
            path: path.clone(),
            source,
        })?;
        let is_schema = path
            .extension()
            .is_some_and(|ext| ext == config.extension.as_str());

        if file_type.is_symlink() {
            if is_schema {
                return Err(SchemaError::Corpus(format!(
                    "refusing to load schema symlink: {}",
                    path.display()
                )));
            }
            continue;
        }
        if file_type.is_dir() {
            walk(root, &path, config, out)?;
            continue;
        }
        if !file_type.is_file() || !is_schema {
            continue;
        }

        out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        if out.len() > config.max_files {
            return Err(SchemaError::Corpus(format!(
                "schema file count exceeds configured max ({})",
                config.max_files
            )));
        }
    }
    Ok(())
}

fn read_limited(path: &Path, max_bytes: usize) -> Result<String> {
    let load = |source| SchemaError::Load {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(load)?;
    let len = file.metadata().map_err(load)?.len();
    if len > max_bytes as u64 {
        return Err(SchemaError::Corpus(format!(
            "schema file too large ({len} bytes): {}",
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(load)?;
    if content.len() > max_bytes {
        return Err(SchemaError::Corpus(format!(
            "schema file too large while reading: {}",
            path.display()
        )));
    }
    Ok(content)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
