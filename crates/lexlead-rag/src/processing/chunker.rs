#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub heading: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Splits statute and case text into overlapping passages, preferring to cut
/// at paragraph, sentence, line and word boundaries in that order.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            min_chunk_size,
        }
    }

    pub fn from_config(config: &crate::config::ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_size)
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.len() <= self.chunk_size {
            if text.trim().len() < self.min_chunk_size {
                return Vec::new();
            }
            return vec![Chunk {
                text: text.to_string(),
                index: 0,
                heading: extract_heading(text),
                start_offset: 0,
                end_offset: text.len(),
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut heading: Option<String> = None;

        while start < text.len() {
            let end = snap_to_char_boundary(text, start + self.chunk_size);
            let actual_end = if end < text.len() {
                self.find_break_point(text, start, end)
            } else {
                end
            };

            let chunk_text = &text[start..actual_end];
            // Carry the most recent heading into chunks that start mid-section.
            if let Some(h) = extract_heading(chunk_text) {
                heading = Some(h);
            }

            if chunk_text.trim().len() >= self.min_chunk_size {
                chunks.push(Chunk {
                    text: chunk_text.to_string(),
                    index: chunks.len(),
                    heading: heading.clone(),
                    start_offset: start,
                    end_offset: actual_end,
                });
            }

            if actual_end >= text.len() {
                break;
            }

            let span = actual_end - start;
            let step = if span > self.chunk_overlap {
                span - self.chunk_overlap
            } else {
                span
            };
            let next = snap_to_char_boundary(text, start + step);
            start = if next > start {
                next
            } else {
                next_char_boundary(text, start)
            };
        }

        chunks
    }

    fn find_break_point(&self, text: &str, start: usize, preferred_end: usize) -> usize {
        let search_start = snap_to_char_boundary(text, preferred_end.saturating_sub(200).max(start));
        let safe_end = snap_to_char_boundary(text, preferred_end);

        if search_start >= safe_end {
            return safe_end;
        }

        let search_region = &text[search_start..safe_end];
        let candidates = [("\n\n", 2), (". ", 2), (".\n", 2), ("\n", 1), (" ", 1)];
        for (pattern, advance) in candidates {
            if let Some(pos) = search_region.rfind(pattern) {
                let cut = search_start + pos + advance;
                if cut > start {
                    return cut;
                }
            }
        }

        safe_end
    }
}

/// Markdown heading or an Illinois-style section marker ("Sec. 5-101.").
fn extract_heading(text: &str) -> Option<String> {
    let first_line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if first_line.starts_with('#') {
        Some(first_line.trim_start_matches('#').trim().to_string())
    } else if first_line.starts_with("Sec.") || first_line.starts_with('§') {
        Some(first_line.chars().take(120).collect())
    } else {
        None
    }
}

/// Snap a byte offset down to the nearest UTF-8 char boundary.
fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    let mut p = pos + 1;
    while p < text.len() && !text.is_char_boundary(p) {
        p += 1;
    }
    p.min(text.len())
}
