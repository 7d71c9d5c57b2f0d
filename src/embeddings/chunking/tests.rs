use super::*;
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent directories");
    }
    fs::write(path, content).expect("should write test file");
}

#[test]
fn split_on_top_level_headings() {
    let chunks = split_markdown("# Intro\nHello\n# Body\nWorld", 1);
    assert_eq!(chunks, vec!["Intro\nHello", "Body\nWorld"]);
}

#[test]
fn text_before_first_heading_is_a_chunk() {
    let chunks = split_markdown("Preface line\n\n# Intro\nHello", 1);
    assert_eq!(chunks, vec!["Preface line", "Intro\nHello"]);
}

#[test]
fn empty_fragments_are_discarded() {
    assert!(split_markdown("", 1).is_empty());
    assert!(split_markdown("   \n\n  ", 1).is_empty());
    assert_eq!(split_markdown("#\n# \n# Real\ntext", 1), vec!["Real\ntext"]);
}

#[test]
fn deeper_headings_stay_inside_chunk() {
    let text = "# Guide\nIntro\n## Install\nRun it\n# Reference\nAPI";
    let chunks = split_markdown(text, 1);
    assert_eq!(chunks, vec!["Guide\nIntro\n## Install\nRun it", "Reference\nAPI"]);
}

#[test]
fn heading_level_controls_split_depth() {
    let text = "# Guide\nIntro\n## Install\nRun it\n### Detail\nMore";
    let chunks = split_markdown(text, 2);
    assert_eq!(
        chunks,
        vec!["Guide\nIntro", "Install\nRun it\n### Detail\nMore"]
    );
}

#[test]
fn headings_in_code_blocks_do_not_split() {
    let text = "# Setup\n```bash\n# install dependencies\nnpm install\n```\n# Usage\nRun";
    let chunks = split_markdown(text, 1);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].contains("# install dependencies"));
    assert_eq!(chunks[1], "Usage\nRun");
}

#[test]
fn headings_in_block_quotes_do_not_split() {
    let text = "# Notes\n> # Quoted\n> text\n";
    let chunks = split_markdown(text, 1);
    assert_eq!(chunks, vec!["Notes\n> # Quoted\n> text"]);
}

#[test]
fn splitting_is_idempotent() {
    let inputs = [
        "# Intro\nHello\n# Body\nWorld",
        "Preface\n\n# A\nalpha\n\n## A.1\nnested\n# B\n```sh\n# not a heading\n```",
        "no headings at all\njust text",
        "# Only\n",
    ];

    for input in inputs {
        let chunks = split_markdown(input, 1);
        let rebuilt = chunks
            .iter()
            .map(|chunk| format!("# {}", chunk))
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(split_markdown(&rebuilt, 1), chunks, "input: {input:?}");
    }
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate_text("hello", 10), "hello");
    assert_eq!(truncate_text("hello", 5), "hello");
    assert_eq!(truncate_text("hello", 3), "hel");
    assert_eq!(truncate_text("héllo wörld", 7), "héllo w");
    assert_eq!(truncate_text("日本語テキスト", 3), "日本語");
    assert_eq!(truncate_text("anything", 0), "");
}

#[test]
fn load_directory_recursively() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(temp_dir.path(), "a.md", b"# Intro\nHello\n# Body\nWorld");
    write_file(temp_dir.path(), "nested/deeper/b.md", b"# Only\nchunk");
    write_file(temp_dir.path(), "notes.txt", b"# Ignored\nnot markdown");
    write_file(temp_dir.path(), "UPPER.MD", b"Shouting");

    let set = load_markdown_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("should load markdown files");

    assert_eq!(set.files_found, 3);
    assert_eq!(set.files_skipped, 0);
    assert_eq!(set.total_chunks(), 4);
    assert_eq!(
        set.documents.get("a.md"),
        Some(&vec!["Intro\nHello".to_string(), "Body\nWorld".to_string()])
    );
    assert!(set.documents.contains_key("nested/deeper/b.md"));
    assert!(set.documents.contains_key("UPPER.MD"));
}

#[test]
fn empty_files_are_dropped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(temp_dir.path(), "empty.md", b"   \n\n");
    write_file(temp_dir.path(), "full.md", b"# Title\nbody");

    let set = load_markdown_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("should load markdown files");

    assert_eq!(set.files_found, 2);
    assert!(!set.documents.contains_key("empty.md"));
    assert_eq!(set.documents.len(), 1);
}

#[test]
fn undecodable_files_are_skipped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(temp_dir.path(), "bad.md", &[0xff, 0xfe, 0x00, 0x23, 0x20]);
    write_file(temp_dir.path(), "good.md", b"# Fine\ncontent");

    let set = load_markdown_files(temp_dir.path(), &ChunkingConfig::default())
        .expect("a bad file should not fail the load");

    assert_eq!(set.files_found, 2);
    assert_eq!(set.files_skipped, 1);
    assert_eq!(set.documents.len(), 1);
    assert!(set.documents.contains_key("good.md"));
}

#[test]
fn missing_directory_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = load_markdown_files(&temp_dir.path().join("absent"), &ChunkingConfig::default());
    assert!(matches!(result, Err(RagError::Io(_))));
}

#[test]
fn prepare_chunks_numbers_and_truncates() {
    let mut set = DocumentSet::default();
    set.documents.insert(
        "a.md".to_string(),
        vec!["first chunk".to_string(), "second chunk".to_string()],
    );
    set.documents
        .insert("b.md".to_string(), vec!["x".repeat(20)]);

    let chunks: Vec<Chunk> = prepare_chunks(&set, 10).collect();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].source_file, "a.md");
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].text, "first chun");
    assert_eq!(chunks[1].chunk_index, 1);
    assert_eq!(chunks[2].source_file, "b.md");
    assert_eq!(chunks[2].chunk_index, 0);
    assert_eq!(chunks[2].text.chars().count(), 10);
}
