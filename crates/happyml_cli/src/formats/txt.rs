//! Plain-text word packing into single-column CSV rows (spec §6 "File
//! formats"): words are accumulated until `character_limit` would be
//! exceeded, flushing early at a sentence boundary once the row is already
//! past 80% of the limit, grounded in the original converter's
//! `convert_txt_to_csv` pass.

const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// Pack `content`'s words into rows of at most `character_limit` bytes
/// each, returning one single-cell row per chunk (ready to hand to a
/// one-column `text` dataset). A row flushes early, right after a
/// sentence-ending word, once it has reached 80% of `character_limit`.
pub fn pack(content: &str, character_limit: usize) -> Vec<Vec<String>> {
    let flush_threshold = (character_limit * 8) / 10;
    let mut rows = Vec::new();
    let mut current = String::new();

    for word in content.split_whitespace() {
        let extra = if current.is_empty() { word.len() } else { word.len() + 1 };
        if !current.is_empty() && current.len() + extra > character_limit {
            rows.push(vec![std::mem::take(&mut current)]);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        let ends_sentence = word.chars().last().map(|c| SENTENCE_ENDINGS.contains(&c)).unwrap_or(false);
        if ends_sentence && current.len() >= flush_threshold {
            rows.push(vec![std::mem::take(&mut current)]);
        }
    }
    if !current.is_empty() {
        rows.push(vec![current]);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_stays_in_one_row() {
        let rows = pack("hello world", 4000);
        assert_eq!(rows, vec![vec!["hello world".to_string()]]);
    }

    #[test]
    fn flushes_at_a_sentence_boundary_past_the_threshold() {
        let sentence = "word ".repeat(20) + "end.";
        let rows = pack(&sentence, sentence.len() - 1);
        assert!(rows.len() >= 2);
        assert!(rows[0][0].ends_with('.'));
    }

    #[test]
    fn never_exceeds_the_character_limit_by_more_than_one_overlong_word() {
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh";
        let rows = pack(text, 10);
        for row in &rows {
            assert!(row[0].len() <= 10 || !row[0].contains(' '));
        }
    }
}
