// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Assembling recognised text lines into markdown
//!
//! Lines are first merged into row segments, then into blocks. With layout
//! regions available, each region becomes a block whose label picks the
//! markdown form; lines outside every region are grouped into paragraphs
//! geometrically. Blocks are emitted in column-aware reading order.

use crate::models::LayoutRegion;

/// Two segments on the same row are joined when the horizontal gap is below
/// this multiple of the line height.
const ROW_JOIN_GAP: f32 = 1.5;

/// A row starts a new paragraph when the vertical gap exceeds this multiple
/// of the previous row's height.
const PARAGRAPH_GAP: f32 = 0.75;

/// Blocks narrower than this fraction of the page may sit in a column
const COLUMN_MAX_WIDTH: f32 = 0.6;

/// A recognised line of text in page pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// x1, y1, x2, y2
    pub bbox: [f32; 4],
    pub confidence: f32,
}

impl TextLine {
    pub fn new(text: impl Into<String>, bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }

    fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }

    fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }

    fn overlaps_horizontally(&self, other: &[f32; 4]) -> bool {
        self.bbox[0] < other[2] && other[0] < self.bbox[2]
    }
}

/// A labelled group of lines
#[derive(Debug, Clone)]
struct Block {
    label: String,
    bbox: [f32; 4],
    lines: Vec<TextLine>,
}

impl Block {
    fn from_line(label: &str, line: TextLine) -> Self {
        Self {
            label: label.to_string(),
            bbox: line.bbox,
            lines: vec![line],
        }
    }

    fn push(&mut self, line: TextLine) {
        self.bbox = union(&self.bbox, &line.bbox);
        self.lines.push(line);
    }
}

fn union(a: &[f32; 4], b: &[f32; 4]) -> [f32; 4] {
    [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]
}

/// Markdown for one page plus the picture regions found on it
#[derive(Debug, Clone, Default)]
pub struct PageMarkdown {
    pub markdown: String,
    pub pictures: Vec<LayoutRegion>,
}

/// Join horizontally adjacent segments that share a row
pub fn merge_rows(mut lines: Vec<TextLine>) -> Vec<TextLine> {
    lines.retain(|line| !line.text.trim().is_empty());
    lines.sort_by(|a, b| a.center().1.total_cmp(&b.center().1));

    let mut rows: Vec<Vec<TextLine>> = Vec::new();
    for line in lines {
        let (_, cy) = line.center();
        match rows
            .iter_mut()
            .rev()
            .find(|row| row.iter().any(|r| cy >= r.bbox[1] && cy <= r.bbox[3]))
        {
            Some(row) => row.push(line),
            None => rows.push(vec![line]),
        }
    }

    let mut merged = Vec::new();
    for mut row in rows {
        row.sort_by(|a, b| a.bbox[0].total_cmp(&b.bbox[0]));
        let mut current: Option<TextLine> = None;
        for segment in row {
            current = Some(match current.take() {
                Some(mut open) => {
                    let gap = segment.bbox[0] - open.bbox[2];
                    if gap <= ROW_JOIN_GAP * open.height().max(segment.height()) {
                        open.text.push(' ');
                        open.text.push_str(segment.text.trim());
                        open.bbox = union(&open.bbox, &segment.bbox);
                        open.confidence = open.confidence.min(segment.confidence);
                        open
                    } else {
                        merged.push(open);
                        segment
                    }
                }
                None => segment,
            });
        }
        merged.extend(current);
    }

    merged.sort_by(|a, b| a.bbox[1].total_cmp(&b.bbox[1]).then(a.bbox[0].total_cmp(&b.bbox[0])));
    merged
}

/// Group row segments into paragraphs by vertical proximity
fn group_paragraphs(lines: Vec<TextLine>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for line in merge_rows(lines) {
        let open = blocks.iter_mut().rev().find(|block| {
            block.lines.last().is_some_and(|last| {
                let gap = line.bbox[1] - last.bbox[3];
                line.overlaps_horizontally(&block.bbox)
                    && gap >= -last.height() / 2.0
                    && gap <= PARAGRAPH_GAP * last.height()
            })
        });

        match open {
            Some(block) => block.push(line),
            None => blocks.push(Block::from_line("text", line)),
        }
    }

    blocks
}

/// Order blocks top to bottom, reading narrow side-by-side blocks column by column
fn reading_order(mut blocks: Vec<Block>, page_width: f32) -> Vec<Block> {
    blocks.sort_by(|a, b| a.bbox[1].total_cmp(&b.bbox[1]));

    let middle = page_width / 2.0;
    let in_column = |block: &Block| {
        block.bbox[2] - block.bbox[0] < COLUMN_MAX_WIDTH * page_width
            && (block.bbox[2] <= middle || block.bbox[0] >= middle)
    };

    let mut ordered = Vec::with_capacity(blocks.len());
    let mut band: Vec<Block> = Vec::new();

    let flush = |band: &mut Vec<Block>, ordered: &mut Vec<Block>| {
        band.sort_by(|a, b| {
            let column = |block: &Block| (block.bbox[0] >= middle) as u8;
            column(a).cmp(&column(b)).then(a.bbox[1].total_cmp(&b.bbox[1]))
        });
        ordered.append(band);
    };

    for block in blocks {
        if in_column(&block) {
            band.push(block);
        } else {
            flush(&mut band, &mut ordered);
            ordered.push(block);
        }
    }
    flush(&mut band, &mut ordered);

    ordered
}

fn render_block(block: &Block) -> Option<String> {
    let rows: Vec<&str> = block
        .lines
        .iter()
        .map(|line| line.text.trim())
        .filter(|text| !text.is_empty())
        .collect();
    if rows.is_empty() {
        return None;
    }
    let joined = rows.join(" ");

    let rendered = match block.label.as_str() {
        "doc_title" => format!("# {}", joined),
        "paragraph_title" => format!("## {}", joined),
        "figure_title" | "table_title" | "chart_title" => format!("*{}*", joined),
        "formula" => format!("$$\n{}\n$$", rows.join("\n")),
        "table" | "algorithm" => rows.join("\n"),
        // Running page furniture
        "header" | "footer" | "number" | "formula_number" => return None,
        _ => joined,
    };

    Some(rendered)
}

/// Build the markdown for one page
pub fn assemble_page(lines: Vec<TextLine>, regions: &[LayoutRegion], page_width: f32) -> PageMarkdown {
    let pictures: Vec<LayoutRegion> = regions.iter().filter(|r| r.is_picture()).cloned().collect();

    let mut text_regions: Vec<&LayoutRegion> = regions.iter().filter(|r| !r.is_picture()).collect();
    text_regions.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut region_lines: Vec<Vec<TextLine>> = vec![Vec::new(); text_regions.len()];
    let mut loose = Vec::new();

    for line in lines {
        let (cx, cy) = line.center();
        if pictures.iter().any(|p| p.contains(cx, cy)) {
            continue;
        }
        match text_regions.iter().position(|r| r.contains(cx, cy)) {
            Some(index) => region_lines[index].push(line),
            None => loose.push(line),
        }
    }

    let mut blocks = group_paragraphs(loose);
    for (region, lines) in text_regions.iter().zip(region_lines) {
        let mut rows = merge_rows(lines).into_iter();
        if let Some(first) = rows.next() {
            let mut block = Block::from_line(&region.label, first);
            rows.for_each(|row| block.push(row));
            blocks.push(block);
        }
    }

    let markdown = reading_order(blocks, page_width)
        .iter()
        .filter_map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n");

    PageMarkdown { markdown, pictures }
}

/// Join page markdown, skipping empty pages
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
