/// Limits and conventions for loading a schema corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    /// File extension of schema files, without the dot.
    pub extension: String,
    /// Maximum number of schema files loaded from a directory tree.
    pub max_files: usize,
    /// Maximum bytes allowed per schema file.
    pub max_file_size: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extension: "th".to_string(),
            max_files: 1024,
            max_file_size: 1024 * 1024,
        }
    }
}
