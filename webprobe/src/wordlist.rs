use probe_engine::scan::clean_words;
use std::path::Path;
use webprobe_core::ScanError;

/// Read a newline-delimited list. Bytes that are not UTF-8 are replaced, blank
/// lines and `#` comments are skipped, and duplicates are dropped.
pub fn load_wordlist(path: &Path) -> Result<Vec<String>, ScanError> {
    let bytes = std::fs::read(path).map_err(|source| ScanError::Wordlist { path: path.display().to_string(), source })?;
    let words = parse_wordlist(&bytes);
    if words.is_empty() {
        return Err(ScanError::Config(format!("{} has no usable entries", path.display())));
    }
    Ok(words)
}

pub fn parse_wordlist(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    clean_words(lines.as_slice())
}
