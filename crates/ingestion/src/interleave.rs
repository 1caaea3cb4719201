//! Interleaving of text lines with chart/table placeholders
//!
//! Produces one document string: pages headed by `--- Page N ---` and
//! separated by a blank line. Page node construction splits on that header.

use crate::layout::{PagePlaceholder, PagePlaceholders};
use crate::pdf::Word;
use regex_lite::Regex;
use std::sync::OnceLock;

/// Header prefix opening every page of the interleaved text
pub const PAGE_HEADER_PREFIX: &str = "--- Page ";

fn numeric_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d.%$\s,-]+$").expect("valid numeric-line regex"))
}

/// A text line in page points, top-left origin
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub y0: f32,
    pub y1: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TextInterleaver {
    /// Lines with fewer words are dropped
    pub min_words: usize,
    /// Pixels per point of the rendered pages placeholders were found on
    pub render_scale: f32,
}

impl Default for TextInterleaver {
    fn default() -> Self {
        Self {
            min_words: 5,
            render_scale: 2.0,
        }
    }
}

impl TextInterleaver {
    pub fn new(min_words: usize, render_scale: f32) -> Self {
        Self {
            min_words,
            render_scale,
        }
    }

    /// Interleave every page. `pages[0]` is page 1.
    pub fn interleave(&self, pages: &[Vec<Word>], placeholders: &PagePlaceholders) -> String {
        pages
            .iter()
            .enumerate()
            .map(|(idx, words)| {
                let page_num = idx as u32 + 1;
                let page_placeholders = placeholders
                    .get(&page_num)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                self.interleave_page(page_num, words, page_placeholders)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One page: header, then lines top to bottom, each preceded by the
    /// unused placeholders whose band touches it, then leftover placeholders.
    pub fn interleave_page(
        &self,
        page_num: u32,
        words: &[Word],
        placeholders: &[PagePlaceholder],
    ) -> String {
        let mut out = vec![format!("{}{} ---", PAGE_HEADER_PREFIX, page_num)];
        let mut used = vec![false; placeholders.len()];

        for line in self.page_lines(words) {
            for (i, ph) in placeholders.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let band = ph.bbox.scaled_down(self.render_scale);
                if band.overlaps_band(line.y0, line.y1) {
                    out.push(ph.placeholder.clone());
                    used[i] = true;
                }
            }
            out.push(line.text);
        }

        for (i, ph) in placeholders.iter().enumerate() {
            if !used[i] {
                out.push(ph.placeholder.clone());
            }
        }

        out.join("\n")
    }

    /// Group words by `(block, line)`, keep substantive lines, sort by top.
    ///
    /// A line takes the vertical extent of its first word.
    pub fn page_lines(&self, words: &[Word]) -> Vec<TextLine> {
        let mut keys: Vec<(u32, u32)> = Vec::new();
        let mut grouped: Vec<(f32, f32, Vec<&str>)> = Vec::new();

        for word in words {
            let key = (word.block, word.line);
            match keys.iter().position(|k| *k == key) {
                Some(idx) => grouped[idx].2.push(word.text.as_str()),
                None => {
                    keys.push(key);
                    grouped.push((word.y0, word.y1, vec![word.text.as_str()]));
                }
            }
        }

        let mut lines: Vec<TextLine> = grouped
            .into_iter()
            .filter_map(|(y0, y1, words)| {
                let text = words.join(" ").trim().to_string();
                let keep = !text.is_empty()
                    && text.split_whitespace().count() >= self.min_words
                    && !numeric_only_regex().is_match(&text);
                keep.then_some(TextLine { y0, y1, text })
            })
            .collect();

        lines.sort_by(|a, b| a.y0.partial_cmp(&b.y0).unwrap_or(std::cmp::Ordering::Equal));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    fn words(line: &str, block: u32, line_no: u32, y0: f32) -> Vec<Word> {
        line.split_whitespace()
            .enumerate()
            .map(|(i, w)| Word {
                x0: i as f32 * 30.0,
                y0,
                x1: i as f32 * 30.0 + 25.0,
                y1: y0 + 10.0,
                text: w.to_string(),
                block,
                line: line_no,
            })
            .collect()
    }

    fn ph(name: &str, y1: f32, y2: f32) -> PagePlaceholder {
        PagePlaceholder {
            placeholder: name.to_string(),
            bbox: BBox::new(0.0, y1, 100.0, y2),
        }
    }

    #[test]
    fn test_short_and_numeric_lines_dropped() {
        let mut page = words("Server DRAM contract prices rose again", 1, 1, 100.0);
        page.extend(words("Too short line", 1, 2, 120.0));
        page.extend(words("12.5 % 13.1 % $ 4,200 - 7", 2, 1, 140.0));

        let lines = TextInterleaver::default().page_lines(&page);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Server DRAM contract prices rose again");
    }

    #[test]
    fn test_lines_sorted_by_top() {
        let mut page = words("the second line of the page", 2, 1, 300.0);
        page.extend(words("the first line of the page", 1, 1, 100.0));

        let lines = TextInterleaver::default().page_lines(&page);
        assert_eq!(lines[0].text, "the first line of the page");
        assert_eq!(lines[1].text, "the second line of the page");
    }

    #[test]
    fn test_placeholder_inserted_before_overlapping_line() {
        let mut page = words("intro text above the chart here", 1, 1, 50.0);
        page.extend(words("caption text beside the chart body", 2, 1, 210.0));
        page.extend(words("closing text far below the chart", 3, 1, 600.0));

        // pixel band 400..500 at scale 2 is points 200..250
        let placeholders = vec![ph("[Doc_Chart1_Page1]", 400.0, 500.0)];
        let text = TextInterleaver::default().interleave_page(1, &page, &placeholders);

        assert_eq!(
            text,
            "--- Page 1 ---\n\
             intro text above the chart here\n\
             [Doc_Chart1_Page1]\n\
             caption text beside the chart body\n\
             closing text far below the chart"
        );
    }

    #[test]
    fn test_unused_placeholders_appended_once() {
        let page = words("only text line on this page", 1, 1, 50.0);
        let placeholders = vec![
            ph("[Doc_Chart1_Page2]", 1000.0, 1100.0),
            ph("[Doc_Table1_Page2]", 1200.0, 1300.0),
        ];
        let text = TextInterleaver::default().interleave_page(2, &page, &placeholders);
        assert_eq!(
            text,
            "--- Page 2 ---\nonly text line on this page\n[Doc_Chart1_Page2]\n[Doc_Table1_Page2]"
        );
    }

    #[test]
    fn test_pages_joined_by_blank_line() {
        let pages = vec![
            words("words on the very first page", 1, 1, 50.0),
            vec![],
        ];
        let mut map = PagePlaceholders::new();
        map.insert(2, vec![ph("[Doc_Table1_Page2]", 10.0, 20.0)]);

        let text = TextInterleaver::default().interleave(&pages, &map);
        assert_eq!(
            text,
            "--- Page 1 ---\nwords on the very first page\n\n--- Page 2 ---\n[Doc_Table1_Page2]"
        );
    }
}
