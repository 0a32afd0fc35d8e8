use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, SchemaError};

lazy_static! {
    static ref ANNOTATION_REGEX: Regex =
        Regex::new(r"/\*\s*(include|not_message)\s*:([\s\S]*?)\*/").unwrap();
}

/// Per-file annotations, read once from comment markers:
///
/// ```text
/// /* include: "common.th", shapes.th */
/// /* not_message: Point, Color */
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Included files, relative to the corpus root, in annotation order.
    pub includes: Vec<String>,
    /// Struct names declared in this file that are plain types, not messages.
    pub excluded: Vec<String>,
}

impl FileMetadata {
    /// Parse the annotations of one file. Each kind may appear at most once.
    pub fn parse(text: &str, file: &Path) -> Result<Self> {
        let mut includes = None;
        let mut excluded = None;

        for caps in ANNOTATION_REGEX.captures_iter(text) {
            let (Some(whole), Some(kind), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let slot = match kind.as_str() {
                "include" => &mut includes,
                _ => &mut excluded,
            };
            if slot.is_some() {
                let (line, column) = position(text, whole.start());
                return Err(SchemaError::Syntax {
                    file: file.to_path_buf(),
                    line,
                    column,
                    message: format!("duplicate `{}` annotation", kind.as_str()),
                });
            }
            *slot = Some(split_list(body.as_str()));
        }

        Ok(Self {
            includes: includes.unwrap_or_default(),
            excluded: excluded.unwrap_or_default(),
        })
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|n| n == name)
    }
}

fn split_list(body: &str) -> Vec<String> {
    body.split(|c: char| c == ',' || c.is_whitespace())
        .map(|item| item.trim_matches(|c| c == '"' || c == '\''))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, str::len) + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<FileMetadata> {
        FileMetadata::parse(text, Path::new("m.th"))
    }

    #[test]
    fn no_annotations() {
        assert_eq!(parse("struct A { uint8 x; };").unwrap(), FileMetadata::default());
    }

    #[test]
    fn includes_strip_quotes() {
        let meta = parse("/* include: \"common.th\", shapes/box.th */").unwrap();
        assert_eq!(meta.includes, vec!["common.th", "shapes/box.th"]);
        assert!(meta.excluded.is_empty());
    }

    #[test]
    fn not_message_list() {
        let meta = parse("/*not_message: Point,Color */\nstruct Point { uint8 x; };").unwrap();
        assert_eq!(meta.excluded, vec!["Point", "Color"]);
        assert!(meta.is_excluded("Color"));
        assert!(!meta.is_excluded("Frame"));
    }

    #[test]
    fn annotation_may_span_lines() {
        let meta = parse("/* include:\n   a.th,\n   b.th\n*/").unwrap();
        assert_eq!(meta.includes, vec!["a.th", "b.th"]);
    }

    #[test]
    fn ordinary_comments_ignored() {
        let meta = parse("/* this file includes nothing */\n// include: x.th").unwrap();
        assert!(meta.includes.is_empty());
    }

    #[test]
    fn duplicate_annotation_rejected() {
        let err = parse("/* include: a.th */\n\n/* include: b.th */").unwrap_err();
        match err {
            SchemaError::Syntax { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("include"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
