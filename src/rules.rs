//! Ignore rules kept in a file, one selector per line.
//!
//! Blank lines and lines starting with `#` are skipped; surrounding whitespace is trimmed.

pub fn parse_rules(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[test]
fn test_parse_rules() {
    let i = r#"
# session noise
//@id
   //div[@class='ad']

#//span
//@data-ts # not a comment
"#;
    assert_eq!(
        parse_rules(i),
        ["//@id", "//div[@class='ad']", "//@data-ts # not a comment"]
    );
}
