//! RFC 4180 CSV parsing and writing: double-quoted fields, `""` as an
//! escaped quote, and `\n`/`\r\n` preserved when inside a quoted field
//! (spec §6 "File formats").

/// Parse a full CSV document into rows of cells. Unlike a line-oriented
/// split, this walks the whole buffer so a `\n` inside a quoted field
/// doesn't end the row early.
pub fn parse(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    let mut saw_any_char_in_row = false;

    while let Some(c) = chars.next() {
        saw_any_char_in_row = true;
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {
                // Swallow; a following '\n' (or a bare '\r') ends the row.
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                saw_any_char_in_row = false;
            }
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                saw_any_char_in_row = false;
            }
            other => field.push(other),
        }
    }
    if saw_any_char_in_row || !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Parse tab-delimited text (no quoting): one row per line, cells split on
/// `\t`.
pub fn parse_tsv(content: &str) -> Vec<Vec<String>> {
    content
        .lines()
        .filter(|l| !l.is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Quote `cell` only if it contains a comma, quote, or newline, doubling
/// any embedded quotes.
pub fn quote_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

pub fn write_row(cells: &[String]) -> String {
    cells.iter().map(|c| quote_cell(c)).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_rows() {
        let rows = parse("a,b,c\n1,2,3\n");
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }

    #[test]
    fn keeps_newlines_inside_quoted_fields() {
        let rows = parse("\"line one\nline two\",plain\n");
        assert_eq!(rows, vec![vec!["line one\nline two", "plain"]]);
    }

    #[test]
    fn doubled_quotes_unescape_to_one() {
        let rows = parse("\"she said \"\"hi\"\"\",b\n");
        assert_eq!(rows, vec![vec!["she said \"hi\"", "b"]]);
    }

    #[test]
    fn write_row_quotes_only_when_needed() {
        assert_eq!(write_row(&["plain".into(), "has,comma".into()]), "plain,\"has,comma\"");
    }

    #[test]
    fn tsv_splits_on_tabs() {
        let rows = parse_tsv("a\tb\tc\n1\t2\t3\n");
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }
}
