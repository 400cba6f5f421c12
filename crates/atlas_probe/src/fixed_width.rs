//! Fixed-width field boundary detection.
//!
//! Files with no delimiter at all are treated as fixed-width: a character
//! position is a separator when every sampled line that reaches it holds a
//! space there. Maximal runs of non-separator positions become fields, and
//! the last field is open-ended so ragged trailing values survive.

use serde::{Deserialize, Serialize};

/// Detected field spans, as half-open character ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWidthLayout {
    fields: Vec<(usize, usize)>,
}

impl FixedWidthLayout {
    /// Detect a layout from sampled lines.
    ///
    /// Returns None when fewer than two fields emerge, since a single run of
    /// text carries no structure worth declaring.
    pub fn detect(lines: &[String]) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        let chars: Vec<Vec<char>> = lines.iter().map(|l| l.chars().collect()).collect();
        let width = chars.iter().map(|l| l.len()).max()?;
        if width == 0 {
            return None;
        }

        // Separator iff every line long enough to reach the position has a
        // space there. Short lines do not vote.
        let mut separator = vec![true; width];
        for line in &chars {
            for (pos, flag) in separator.iter_mut().enumerate() {
                if let Some(&ch) = line.get(pos) {
                    if ch != ' ' {
                        *flag = false;
                    }
                }
            }
        }

        let mut fields = Vec::new();
        let mut start = None;
        for (pos, &is_sep) in separator.iter().enumerate() {
            match (is_sep, start) {
                (false, None) => start = Some(pos),
                (true, Some(s)) => {
                    fields.push((s, pos));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            fields.push((s, width));
        }

        if fields.len() < 2 {
            return None;
        }
        Some(Self { fields })
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Slice a line into trimmed field values.
    pub fn split(&self, line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        let last = self.fields.len() - 1;
        self.fields
            .iter()
            .enumerate()
            .map(|(idx, &(start, end))| {
                // The final field runs to the end of the line
                let end = if idx == last { chars.len() } else { end };
                if start >= chars.len() {
                    return String::new();
                }
                let end = end.min(chars.len());
                chars[start..end].iter().collect::<String>().trim().to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_aligned_columns() {
        let sample = lines(&[
            "AB12CD   385386   801193",
            "EF34GH   394251   806376",
        ]);
        let layout = FixedWidthLayout::detect(&sample).unwrap();
        assert_eq!(layout.field_count(), 3);
        assert_eq!(
            layout.split(&sample[0]),
            vec!["AB12CD", "385386", "801193"]
        );
    }

    #[test]
    fn short_lines_do_not_break_the_last_field() {
        let sample = lines(&[
            "AB12CD   385386   801193",
            "IJ56KL   401823   81244",
        ]);
        let layout = FixedWidthLayout::detect(&sample).unwrap();
        assert_eq!(layout.field_count(), 3);
        assert_eq!(layout.split(&sample[0])[2], "801193");
        assert_eq!(layout.split(&sample[1])[2], "81244");
    }

    #[test]
    fn single_run_is_not_a_layout() {
        assert!(FixedWidthLayout::detect(&lines(&["abcdef", "ghijkl"])).is_none());
        assert!(FixedWidthLayout::detect(&[]).is_none());
    }

    #[test]
    fn splitting_a_line_shorter_than_the_layout_pads_empty() {
        let sample = lines(&["aa  bb  cc", "dd  ee  ff"]);
        let layout = FixedWidthLayout::detect(&sample).unwrap();
        assert_eq!(layout.split("xx"), vec!["xx", "", ""]);
    }
}
