use crate::types::KeyName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEnvVar {
    pub key: String,
    pub value: String,
}

/// Parse one `KEY=VALUE` line.
///
/// Blank lines, `#` comments and lines without `=` yield `None`. The key is
/// normalized with [`KeyName::normalize`] but not validated.
pub fn parse_line(line: &str) -> Option<ParsedEnvVar> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (raw_key, raw_value) = trimmed.split_once('=')?;
    Some(ParsedEnvVar {
        key: KeyName::normalize(raw_key),
        value: strip_quotes(raw_value.trim()).to_string(),
    })
}

/// Parse multi-line dotenv content, keeping only entries with a valid key.
pub fn parse_content(content: &str) -> Vec<ParsedEnvVar> {
    content
        .lines()
        .filter_map(parse_line)
        .filter(|parsed| KeyName::is_valid(&parsed.key))
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_line() {
        assert_eq!(
            parse_line("API_URL=https://api.example.com"),
            Some(ParsedEnvVar {
                key: "API_URL".to_string(),
                value: "https://api.example.com".to_string(),
            })
        );
    }

    #[test]
    fn skips_comments_blank_and_bare_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# API_URL=x"), None);
        assert_eq!(parse_line("JUST_A_WORD"), None);
    }

    #[test]
    fn splits_on_first_equals_and_strips_quotes() {
        let parsed = parse_line(r#" token = "a=b=c" "#).unwrap();
        assert_eq!(parsed.key, "TOKEN");
        assert_eq!(parsed.value, "a=b=c");

        let parsed = parse_line("NAME='single'").unwrap();
        assert_eq!(parsed.value, "single");

        let parsed = parse_line("MIXED=\"half'").unwrap();
        assert_eq!(parsed.value, "\"half'");
    }

    #[test]
    fn normalizes_keys() {
        assert_eq!(parse_line("next.public-url=x").unwrap().key, "NEXT_PUBLIC_URL");
    }

    #[test]
    fn content_drops_invalid_keys() {
        let content = "# header\r\nDATABASE_URL=postgres://db\r\n\r\n1BAD=x\nEMPTY=\n=novalue\n";
        let parsed = parse_content(content);
        assert_eq!(
            parsed.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
            vec!["DATABASE_URL", "EMPTY"]
        );
        assert_eq!(parsed[0].value, "postgres://db");
        assert_eq!(parsed[1].value, "");
    }
}
