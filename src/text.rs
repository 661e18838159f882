use crate::types::Pt;

/// Greedy word wrap. Explicit newlines always break; a word wider than the
/// column is split at character boundaries. Always yields at least one line.
pub(crate) fn wrap_lines<F>(text: &str, width: Pt, measure: F) -> Vec<String>
where
    F: Fn(&str) -> Pt,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if width <= Pt::ZERO {
            lines.push(paragraph.to_string());
            continue;
        }
        let before = lines.len();
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= width {
                current = word.to_string();
            } else {
                current = break_word(word, width, &measure, &mut lines);
            }
        }
        if !current.is_empty() || lines.len() == before {
            lines.push(current);
        }
    }
    lines
}

// Pushes every full chunk of `word` and returns the trailing partial chunk.
fn break_word<F>(word: &str, width: Pt, measure: &F, lines: &mut Vec<String>) -> String
where
    F: Fn(&str) -> Pt,
{
    let mut chunk = String::new();
    for ch in word.chars() {
        chunk.push(ch);
        if measure(&chunk) > width && chunk.chars().count() > 1 {
            chunk.pop();
            lines.push(std::mem::take(&mut chunk));
            chunk.push(ch);
        }
    }
    chunk
}

pub(crate) fn wrapped_height(line_count: usize, line_height: Pt) -> Pt {
    let count = line_count.max(1).min(i32::MAX as usize) as i32;
    line_height * count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Every char is 5pt wide.
    fn mono(text: &str) -> Pt {
        Pt::from_i32(5) * text.chars().count() as i32
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap_lines("Retainer", Pt::from_i32(100), mono);
        assert_eq!(lines, vec!["Retainer".to_string()]);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_lines("aaaa bbbb cccc", Pt::from_i32(45), mono);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn explicit_newlines_break_and_empty_lines_survive() {
        let lines = wrap_lines("one\n\ntwo", Pt::from_i32(100), mono);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn overlong_words_break_by_character() {
        let lines = wrap_lines("abcdefghij", Pt::from_i32(20), mono);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn empty_text_measures_one_line() {
        let lines = wrap_lines("", Pt::from_i32(20), mono);
        assert_eq!(lines.len(), 1);
        assert_eq!(wrapped_height(0, Pt::from_i32(12)), Pt::from_i32(12));
    }

    proptest! {
        #[test]
        fn appending_words_never_reduces_height(
            words in proptest::collection::vec("[a-z]{1,12}", 1..30),
            extra in proptest::collection::vec("[a-z]{1,12}", 0..10),
            width in 20i32..200,
        ) {
            let width = Pt::from_i32(width);
            let line_height = Pt::from_i32(12);
            let base = words.join(" ");
            let longer = words.iter().chain(extra.iter()).cloned().collect::<Vec<_>>().join(" ");
            let base_lines = wrap_lines(&base, width, mono).len();
            let longer_lines = wrap_lines(&longer, width, mono).len();
            prop_assert!(base_lines <= longer_lines);
            prop_assert!(
                wrapped_height(base_lines, line_height) <= wrapped_height(longer_lines, line_height)
            );
        }
    }
}
