//! Lead list sources

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use anyhow::{bail, Context, Result};

/// Read one phone number per line
///
/// Blank lines and lines starting with `#` are skipped. Duplicates are an
/// error so a bad list is caught before any agent logs in.
pub fn read_leads_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read leads file {}", path.display()))?;
    parse_leads(&text).with_context(|| format!("Invalid leads file {}", path.display()))
}

pub fn parse_leads(text: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut leads = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let number = line.trim();
        if number.is_empty() || number.starts_with('#') {
            continue;
        }
        if !seen.insert(number.to_string()) {
            bail!("line {}: duplicate number {}", line_no + 1, number);
        }
        leads.push(number.to_string());
    }
    Ok(leads)
}

/// `count` distinct made-up numbers in the 555 exchange
pub fn generate_leads(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("555-{:03}-{:04}", 100 + i / 10_000, i % 10_000))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let leads = parse_leads("# morning list\n865-384-6115\n\n  682-911-0414  \n").unwrap();
        assert_eq!(leads, vec!["865-384-6115", "682-911-0414"]);
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        let err = parse_leads("865-384-6115\n865-384-6115\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_generated_numbers_are_distinct() {
        let leads = generate_leads(25_000);
        let unique: HashSet<_> = leads.iter().collect();
        assert_eq!(unique.len(), 25_000);
        assert_eq!(leads[0], "555-100-0000");
        assert_eq!(leads[10_001], "555-101-0001");
    }
}
