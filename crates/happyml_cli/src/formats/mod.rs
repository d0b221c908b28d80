//! File-format plumbing for `create dataset`'s `using file://<path>`
//! clause (spec §6): CSV, TSV, and word-packed TXT all flatten to the same
//! `Vec<Vec<String>>` row shape before column encoding.

pub mod csv;
pub mod txt;

use std::path::Path;

const TXT_CHARACTER_LIMIT: usize = 4000;

/// Load `path`'s rows as already-split string cells, dispatching on file
/// extension. `.txt` files become single-column rows via [`txt::pack`].
pub fn load_rows(path: &Path) -> Result<Vec<Vec<String>>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("could not read {}: {e}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(csv::parse(&content)),
        Some("tsv") => Ok(csv::parse_tsv(&content)),
        Some("txt") => Ok(txt::pack(&content, TXT_CHARACTER_LIMIT)),
        Some(other) => Err(format!("unsupported file extension '.{other}' (expected .csv, .tsv, or .txt)")),
        None => Err(format!("{} has no file extension", path.display())),
    }
}

/// Strip a `file://` prefix from a `create dataset` location clause.
pub fn strip_file_scheme(location: &str) -> Result<&str, String> {
    location
        .strip_prefix("file://")
        .ok_or_else(|| "create dataset only supports file:// locations".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_the_file_scheme() {
        assert_eq!(strip_file_scheme("file://data/xor.csv").unwrap(), "data/xor.csv");
        assert!(strip_file_scheme("http://example.com").is_err());
    }

    #[test]
    fn loads_a_csv_file() {
        let tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(tmp.path(), "a,b\n1,2\n").unwrap();
        let rows = load_rows(tmp.path()).unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }
}
