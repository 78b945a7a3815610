/// Quote an SQL identifier, doubling any embedded double quotes
///
/// The result is always a delimited identifier, so reserved words, mixed
/// case, and punctuation are all taken literally.
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Names a delimited identifier still cannot hold
pub(crate) fn check_column(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("column name is empty".to_string());
    }
    if name.contains('\0') {
        return Err(format!("column name {:?} contains a NUL character", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        assert_eq!(quote_identifier("name"), r#""name""#);
        assert_eq!(quote_identifier("Order"), r#""Order""#);
    }

    #[test]
    fn test_embedded_quotes_cannot_escape() {
        let hostile = r#"x"); DROP TABLE users; --"#;
        assert_eq!(
            quote_identifier(hostile),
            r#""x""); DROP TABLE users; --""#
        );
    }

    #[test]
    fn test_check_column() {
        assert!(check_column("ok").is_ok());
        assert!(check_column("").is_err());
        assert!(check_column("a\0b").is_err());
    }
}
