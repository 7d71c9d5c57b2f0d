#[cfg(test)]
mod tests;

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::RagError;
use crate::config::IngestConfig;
use crate::config::settings::DEFAULT_MAX_TEXT_LENGTH;

/// A piece of one markdown file, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Source path relative to the ingested directory, `/`-separated
    pub source_file: String,
    /// Zero-based position within the source file
    pub chunk_index: u32,
    /// Chunk text, truncated to the configured maximum length
    pub text: String,
}

/// Configuration for markdown chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Headings at this level or shallower start a new chunk
    pub heading_level: u8,
    /// Maximum chunk length in characters
    pub max_text_length: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            heading_level: 1,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

impl From<&IngestConfig> for ChunkingConfig {
    #[inline]
    fn from(config: &IngestConfig) -> Self {
        Self {
            heading_level: config.heading_level,
            max_text_length: config.max_text_length,
        }
    }
}

/// Markdown files found under a directory, split into chunk texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    /// Relative path to chunk texts in file order; files without chunks are absent
    pub documents: BTreeMap<String, Vec<String>>,
    /// Markdown files found on disk
    pub files_found: usize,
    /// Files that could not be read or decoded
    pub files_skipped: usize,
}

impl DocumentSet {
    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }
}

/// Recursively list `.md` files under `dir`, sorted by path
#[inline]
pub fn discover_markdown_files(dir: &Path) -> Result<Vec<PathBuf>, RagError> {
    if !dir.is_dir() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory '{}' not found", dir.display()),
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Load every markdown file under `dir` and split it into chunks.
///
/// Files that cannot be read as UTF-8 are skipped with a warning.
#[inline]
pub fn load_markdown_files(dir: &Path, config: &ChunkingConfig) -> Result<DocumentSet, RagError> {
    let files = discover_markdown_files(dir)?;
    info!("Loading {} markdown files...", files.len());

    let mut set = DocumentSet {
        files_found: files.len(),
        ..DocumentSet::default()
    };

    for path in files {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                set.files_skipped += 1;
                continue;
            }
        };

        let chunks = split_markdown(&content, config.heading_level);
        let source_file = relative_source_path(dir, &path);
        if chunks.is_empty() {
            debug!("No chunks in {}, dropping it", source_file);
            continue;
        }

        debug!("Split {} into {} chunks", source_file, chunks.len());
        set.documents.insert(source_file, chunks);
    }

    Ok(set)
}

/// Split markdown text into chunks at ATX headings of `heading_level` or shallower.
///
/// The heading marker is removed, fragments are trimmed, and empty fragments
/// are discarded. Headings inside code blocks and nested containers do not split.
#[inline]
pub fn split_markdown(text: &str, heading_level: u8) -> Vec<String> {
    // (offset, starts with a heading)
    let mut boundaries = vec![(0, false)];

    for (event, range) in Parser::new(text).into_offset_iter() {
        let Event::Start(Tag::Heading { level, .. }) = event else {
            continue;
        };
        if heading_level_to_u8(level) > heading_level {
            continue;
        }

        let line_start = text
            .get(..range.start)
            .and_then(|before| before.rfind('\n'))
            .map_or(0, |idx| idx + 1);
        let indent = text.get(line_start..range.start).unwrap_or_default();
        let is_top_level = indent.chars().all(|c| c == ' ');
        let is_atx = text
            .get(line_start..)
            .is_some_and(|line| line.trim_start_matches(' ').starts_with('#'));

        if !(is_top_level && is_atx) {
            continue;
        }
        if line_start == 0 {
            boundaries[0].1 = true;
        } else {
            boundaries.push((line_start, true));
        }
    }
    boundaries.push((text.len(), false));
    boundaries.dedup_by_key(|(offset, _)| *offset);

    boundaries
        .windows(2)
        .filter_map(|window| {
            let (start, is_heading) = window[0];
            let fragment = text.get(start..window[1].0)?;
            Some(if is_heading {
                strip_heading_marker(fragment)
            } else {
                fragment.trim()
            })
        })
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop the leading `#` run of an ATX heading and trim the fragment
fn strip_heading_marker(fragment: &str) -> &str {
    fragment.trim_start_matches(' ').trim_start_matches('#').trim()
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn relative_source_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Flatten a document set into chunks, truncating each text to `max_text_length` characters
#[inline]
pub fn prepare_chunks(
    documents: &DocumentSet,
    max_text_length: usize,
) -> impl Iterator<Item = Chunk> + '_ {
    documents
        .documents
        .iter()
        .flat_map(move |(source_file, chunks)| {
            chunks.iter().enumerate().map(move |(idx, text)| Chunk {
                source_file: source_file.clone(),
                chunk_index: idx as u32,
                text: truncate_text(text, max_text_length).to_string(),
            })
        })
}

/// The first `max_chars` characters of `text`
#[inline]
pub fn truncate_text(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text.get(..idx).unwrap_or(text),
        None => text,
    }
}
