use super::{FontFace, TextMeasure};

pub(crate) const ELLIPSIS: &str = "\u{2026}";

/// Greedy word wrap into at most `max_lines` lines no wider than `max_width`.
///
/// Words wider than the line are broken between characters. When the text
/// needs more lines than allowed, the last kept line is ellipsized.
pub(crate) fn wrap_lines(
    text: &str,
    measure: &dyn TextMeasure,
    face: &FontFace,
    font_px: f64,
    max_width: f64,
    max_lines: usize,
) -> Vec<String> {
    let max_lines = max_lines.max(1);
    let advance = |value: &str| measure.advance(face, value, font_px);

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if advance(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if advance(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for chunk in break_word(word, &advance, max_width) {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current = chunk;
            }
        }
        lines.push(current);
        if lines.len() > max_lines {
            break;
        }
    }

    while lines.len() > 1 && lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            *last = ellipsize(last, &advance, max_width);
        }
    }
    lines
}

fn break_word(word: &str, advance: &dyn Fn(&str) -> f64, max_width: f64) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if advance(&current) > max_width && current.chars().count() > 1 {
            current.pop();
            chunks.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn ellipsize(line: &str, advance: &dyn Fn(&str) -> f64, max_width: f64) -> String {
    let mut kept = line.trim_end().to_string();
    loop {
        let candidate = format!("{kept}{ELLIPSIS}");
        if kept.is_empty() || advance(&candidate) <= max_width {
            return candidate;
        }
        kept.pop();
        let trimmed_len = kept.trim_end().len();
        kept.truncate(trimmed_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::FixedAdvanceMeasure;

    fn wrap(text: &str, max_width: f64, max_lines: usize) -> Vec<String> {
        // 10px per character at font 10 with ratio 1.0.
        let measure = FixedAdvanceMeasure::new(1.0);
        wrap_lines(text, &measure, &FontFace::default(), 10.0, max_width, max_lines)
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("aaa bbb ccc", 70.0, 4), vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn breaks_words_longer_than_the_line() {
        assert_eq!(wrap("abcdefgh", 30.0, 4), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn keeps_explicit_line_breaks() {
        assert_eq!(wrap("one\ntwo", 200.0, 4), vec!["one", "two"]);
    }

    #[test]
    fn ellipsizes_overflowing_last_line() {
        let lines = wrap("aaa bbb ccc ddd", 40.0, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "aaa");
        assert!(lines[1].ends_with(ELLIPSIS));
        assert!(lines[1].chars().count() <= 4);
    }

    #[test]
    fn empty_text_yields_single_empty_line() {
        assert_eq!(wrap("", 100.0, 4), vec![String::new()]);
    }
}
