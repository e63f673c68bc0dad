//! Payload arguments: literal text, `@file`, or `@-` for stdin.

use std::io::Read;

use anyhow::{Context, Result};

pub fn parse_payload(value: &str) -> Result<String> {
    if value == "@-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        Ok(buf)
    } else if let Some(path) = value.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("failed to read payload file: {path}"))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_file_payloads() {
        assert_eq!(parse_payload(r#"{"id":1}"#).unwrap(), r#"{"id":1}"#);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"id":2}"#).unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(parse_payload(&arg).unwrap(), r#"{"id":2}"#);

        assert!(parse_payload("@/definitely/not/here.json").is_err());
    }
}
