//! Quote/escape-aware line tokenizer for the command DSL (spec §6). No
//! external parser-combinator crate — a hand-rolled char scanner, matching
//! the corpus's preference for small purpose-built lexers over a heavier
//! dependency.

/// Split one command line into whitespace-delimited tokens. A token may be
/// single- or double-quoted, in which case whitespace inside it is kept
/// verbatim and a backslash escapes the enclosing quote character (e.g.
/// `"she said \"hi\""` keeps the inner quotes). `(`, `)`, and `:` are
/// always their own token even when touching other text, so the DSL's
/// `(rows, columns, channels)` and `key: value` shapes tokenize without
/// extra whitespace from the caller.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            break; // rest of the line is a comment
        }
        if c == '(' || c == ')' || c == '[' || c == ']' || c == ',' || c == ':' {
            tokens.push(c.to_string());
            chars.next();
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    None => return Err(format!("unterminated quoted string starting with {quote}")),
                    Some('\\') if chars.peek() == Some(&quote) => {
                        value.push(quote);
                        chars.next();
                    }
                    Some('\\') if chars.peek() == Some(&'\\') => {
                        value.push('\\');
                        chars.next();
                    }
                    Some(ch) if ch == quote => break,
                    Some(ch) => value.push(ch),
                }
            }
            tokens.push(value);
            continue;
        }

        let mut value = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '[' || ch == ']' || ch == ',' || ch == ':' || ch == '#' {
                break;
            }
            value.push(ch);
            chars.next();
        }
        tokens.push(value);
    }

    Ok(tokens)
}
