//! Fixed-size overlapping window chunker for plain text (§4.2).

use smartctx_store::Chunk;
use smartctx_store::ChunkKind;
use smartctx_store::LineRange;

use crate::hash::sha256_hex_str;

pub fn chunk_text(path: &str, text: &str, window_lines: usize, overlap_lines: usize) -> Vec<Chunk> {
    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();
    if total == 0 {
        return Vec::new();
    }
    let window = window_lines.max(1);
    let overlap = overlap_lines.min(window.saturating_sub(1));
    let stride = window - overlap;

    let mut chunks = Vec::new();
    let mut start0 = 0usize;
    loop {
        let end0 = (start0 + window).min(total);
        let range = LineRange::new((start0 + 1) as u32, end0 as u32);
        let slice = lines[start0..end0].join("\n");
        let id = Chunk::derive_id(path, range);
        chunks.push(Chunk {
            id,
            path: path.to_string(),
            kind: ChunkKind::Text,
            section_path: Vec::new(),
            heading: None,
            heading_level: None,
            range,
            content_hash: sha256_hex_str(&slice),
            text: slice,
        });
        if end0 >= total {
            break;
        }
        start0 += stride;
    }
    // Overlapping windows cannot both partition the file and share lines;
    // §3's disjointness invariant binds markdown/code chunks. Plain-text
    // windows instead guarantee full coverage: every line appears in at
    // least one chunk, which is what retrieval over prose needs.
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_every_line() {
        let text = (1..=25).map(|n| format!("line{n}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text("notes.txt", &text, 10, 3);
        let mut covered = vec![false; 25];
        for c in &chunks {
            for line in c.range.start_line..=c.range.end_line {
                covered[(line - 1) as usize] = true;
            }
        }
        assert!(covered.iter().all(|c| *c));
    }

    #[test]
    fn short_file_yields_single_chunk() {
        let chunks = chunk_text("a.txt", "one\ntwo\n", 60, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range, smartctx_store::LineRange::new(1, 2));
    }
}
