//! Tag identifiers: validation and the list sources the CLI accepts.

use std::collections::HashSet;
use std::path::Path;

use crate::{Error, Result};

/// A tag must be usable both as a URL path segment and as a file name.
pub fn validate_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTag(tag.to_string()))
    }
}

/// Drop repeated tags, keeping the first occurrence.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// One tag per line; blank lines and `#` comments are ignored.
pub fn parse_tag_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Comma-separated tags, e.g. `"stf, itcmd,reforma-tributaria"`.
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_tags_from_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let tags = parse_tag_lines(&content);
    tracing::info!("Loaded {} tags from {}", tags.len(), path.display());
    Ok(tags)
}

/// Tags from a comma-separated environment variable; empty when unset.
pub fn load_tags_from_env(var: &str) -> Vec<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            let tags = parse_tag_list(&value);
            tracing::info!("Loaded {} tags from env var {}", tags.len(), var);
            tags
        }
        _ => {
            tracing::warn!("Environment variable {} not found or empty", var);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("stf").is_ok());
        assert!(validate_tag("reforma-tributaria").is_ok());
        assert!(validate_tag("icms_st2").is_ok());

        assert!(validate_tag("").is_err());
        assert!(validate_tag("../etc").is_err());
        assert!(validate_tag("a/b").is_err());
        assert!(validate_tag("com espaço").is_err());
        assert!(validate_tag("tributação").is_err());
    }

    #[test]
    fn test_dedup_tags_keeps_order() {
        let tags = vec!["stf".to_string(), "itcmd".to_string(), "stf".to_string()];
        assert_eq!(dedup_tags(&tags), vec!["stf", "itcmd"]);
    }

    #[test]
    fn test_parse_tag_lines() {
        let content = "itcmd\n\n# comentário\n  reforma-tributaria  \nstf\n";
        assert_eq!(
            parse_tag_lines(content),
            vec!["itcmd", "reforma-tributaria", "stf"]
        );
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(parse_tag_list("stf, itcmd,,  carf "), vec!["stf", "itcmd", "carf"]);
        assert!(parse_tag_list(" , ").is_empty());
    }

    #[test]
    fn test_load_tags_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.txt");
        std::fs::write(&path, "stf\n#skip\ncarf\n").unwrap();

        assert_eq!(load_tags_from_file(&path).unwrap(), vec!["stf", "carf"]);
        assert!(load_tags_from_file(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_load_tags_from_env() {
        std::env::set_var("JOTA_RSS_TEST_TAGS", "stf,itcmd");
        assert_eq!(load_tags_from_env("JOTA_RSS_TEST_TAGS"), vec!["stf", "itcmd"]);
        std::env::remove_var("JOTA_RSS_TEST_TAGS");

        assert!(load_tags_from_env("JOTA_RSS_TEST_TAGS_UNSET").is_empty());
    }
}
