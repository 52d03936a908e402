use serde::{Deserialize, Serialize};

/// A contiguous slice of a markdown document treated as one retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text of the nearest preceding H2-H6 heading, empty before the first one.
    pub heading: String,
    /// Non-empty, trimmed body of the chunk.
    pub text: String,
}

/// Size limits for chunk refinement, measured in chars so CJK text is
/// budgeted the same as ASCII.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Sections at or below this size are emitted as a single chunk.
    pub hard_cap_chars: usize,
    /// Target size when an oversized section is re-split on paragraphs.
    pub soft_cap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            hard_cap_chars: 1200,
            soft_cap_chars: 800,
        }
    }
}

/// Heading/paragraph/code-fence-respecting markdown chunker.
pub struct Chunker {
    config: ChunkerConfig,
}

/// A buffered piece of the current section. Fence runs stay atomic through
/// paragraph refinement; everything else splits on blank lines.
enum Segment {
    Line(String),
    FenceRun(String),
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `markdown` into chunks.
    ///
    /// H2-H6 headings close the current section; the section is tagged with
    /// the heading that preceded it. A ``` fence opens an atomic run copied
    /// verbatim (both fences included) until the closing fence or end of
    /// input. Empty sections produce no chunk.
    #[must_use]
    pub fn chunk(&self, markdown: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = markdown
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        let mut chunks = Vec::new();
        let mut heading = String::new();
        let mut buffer: Vec<Segment> = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];

            if is_fence(line) {
                let mut run = vec![line];
                i += 1;
                while i < lines.len() && !is_fence(lines[i]) {
                    run.push(lines[i]);
                    i += 1;
                }
                if i < lines.len() {
                    run.push(lines[i]);
                    i += 1;
                }
                buffer.push(Segment::FenceRun(run.join("\n")));
                continue;
            }

            if let Some(text) = heading_text(line) {
                self.flush(&mut chunks, &heading, &mut buffer);
                heading = text.to_string();
                i += 1;
                continue;
            }

            buffer.push(Segment::Line(line.to_string()));
            i += 1;
        }
        self.flush(&mut chunks, &heading, &mut buffer);

        chunks
    }

    fn flush(&self, chunks: &mut Vec<Chunk>, heading: &str, buffer: &mut Vec<Segment>) {
        if buffer.is_empty() {
            return;
        }
        let segments = std::mem::take(buffer);

        let joined = segments
            .iter()
            .map(|segment| match segment {
                Segment::Line(line) => line.as_str(),
                Segment::FenceRun(run) => run.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let joined = joined.trim();
        if joined.is_empty() {
            return;
        }

        if char_len(joined) <= self.config.hard_cap_chars {
            chunks.push(Chunk {
                heading: heading.to_string(),
                text: joined.to_string(),
            });
            return;
        }

        // Oversized section: re-split on blank-line paragraphs (fence runs
        // stay whole) and greedily pack paragraphs up to the soft cap.
        let mut acc = String::new();
        for paragraph in paragraphs(&segments) {
            let candidate = if acc.is_empty() {
                paragraph.clone()
            } else {
                format!("{acc}\n\n{paragraph}")
            };
            if char_len(&candidate) > self.config.soft_cap_chars {
                push_chunk(chunks, heading, &acc);
                acc = paragraph;
            } else {
                acc = candidate;
            }
        }
        push_chunk(chunks, heading, &acc);
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Chunk `markdown` with the default caps.
#[must_use]
pub fn chunk_markdown(markdown: &str) -> Vec<Chunk> {
    Chunker::default().chunk(markdown)
}

fn push_chunk(chunks: &mut Vec<Chunk>, heading: &str, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(Chunk {
            heading: heading.to_string(),
            text: trimmed.to_string(),
        });
    }
}

/// Group buffered segments into paragraphs. Consecutive non-empty lines form
/// one paragraph; a fence run is always a paragraph of its own.
fn paragraphs(segments: &[Segment]) -> Vec<String> {
    fn flush_lines(current: &mut Vec<&str>, out: &mut Vec<String>) {
        let text = current.join("\n");
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
        current.clear();
    }

    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            Segment::Line(line) if line.trim().is_empty() => {
                flush_lines(&mut current, &mut out);
            }
            Segment::Line(line) => current.push(line),
            Segment::FenceRun(run) => {
                flush_lines(&mut current, &mut out);
                out.push(run.clone());
            }
        }
    }
    flush_lines(&mut current, &mut out);

    out
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```")
}

/// Returns the heading text for an H2-H6 line, `None` otherwise. H1 lines
/// are the document title and do not open a section.
fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(2..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.chars().next()?.is_whitespace() {
        return None;
    }
    Some(rest.trim())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn heading_splits_into_two_chunks() {
        let chunks = chunk_markdown("para1\n## H\npara2");
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    heading: String::new(),
                    text: "para1".to_string()
                },
                Chunk {
                    heading: "H".to_string(),
                    text: "para2".to_string()
                },
            ]
        );
    }

    #[test]
    fn h1_does_not_split() {
        let chunks = chunk_markdown("# Title\nbody line");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "");
        assert_eq!(chunks[0].text, "# Title\nbody line");
    }

    #[test]
    fn heading_levels_two_through_six_split() {
        for level in 2..=6 {
            let marker = "#".repeat(level);
            let chunks = chunk_markdown(&format!("before\n{marker} Section\nafter"));
            assert_eq!(chunks.len(), 2, "level {level}");
            assert_eq!(chunks[1].heading, "Section");
        }
    }

    #[test]
    fn seven_hashes_is_not_a_heading() {
        let chunks = chunk_markdown("before\n####### not a heading\nafter");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let chunks = chunk_markdown("before\n##tag\nafter");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_sections_produce_no_chunk() {
        let chunks = chunk_markdown("## A\n\n## B\ntext");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "B");
    }

    #[test]
    fn crlf_input_is_normalized() {
        let chunks = chunk_markdown("para1\r\n## H\r\npara2\r\n");
        assert_eq!(texts(&chunks), vec!["para1", "para2"]);
    }

    #[test]
    fn fence_run_is_kept_verbatim() {
        let input = "## Code\nintro\n```rust\nfn main() {}\n```\noutro";
        let chunks = chunk_markdown(input);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("```rust\nfn main() {}\n```"));
    }

    #[test]
    fn unterminated_fence_runs_to_end_of_input() {
        let chunks = chunk_markdown("```\nline1\nline2");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "```\nline1\nline2");
    }

    #[test]
    fn heading_inside_fence_does_not_split() {
        let chunks = chunk_markdown("```\n## not a heading\n```\ntail");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "");
    }

    #[test]
    fn oversized_code_block_is_never_split() {
        let body = "let x = 1;\n".repeat(200);
        let input = format!("```rust\n{body}```");
        let chunks = chunk_markdown(&input);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.chars().count() > 1200);
        assert!(chunks[0].text.starts_with("```rust\n"));
        assert!(chunks[0].text.ends_with("```"));
    }

    #[test]
    fn oversized_section_splits_on_paragraphs() {
        let paragraph = "word ".repeat(100).trim().to_string(); // ~500 chars
        let input = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        let chunks = chunk_markdown(&input);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
            assert!(chunk.text.chars().count() <= 800);
        }
    }

    #[test]
    fn small_section_is_one_chunk_even_with_blank_lines() {
        let chunks = chunk_markdown("para1\n\npara2");
        assert_eq!(texts(&chunks), vec!["para1\n\npara2"]);
    }

    #[test]
    fn single_oversized_paragraph_is_emitted_whole() {
        // No blank line to split on: paragraph granularity is the floor.
        let paragraph = "x".repeat(1500);
        let chunks = chunk_markdown(&paragraph);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 1500);
    }

    #[test]
    fn caps_are_measured_in_chars_not_bytes() {
        // 600 CJK chars are ~1800 bytes but still below the hard cap.
        let text = "語".repeat(600);
        let chunks = chunk_markdown(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(chunk_markdown("").is_empty());
        assert!(chunk_markdown("\n\n\n").is_empty());
    }
}
