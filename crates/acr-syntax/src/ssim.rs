//! ssim tuple parser.
//!
//! One record per line: a type tag followed by `key:value` pairs separated by
//! runs of two or more spaces. A single space never separates tokens, so
//! `comment:Algo Cross-Reference` is one pair. Values wrapped in double
//! quotes lose exactly one quote on each side; nothing else is unescaped.
//!
//! ```text
//! dmmeta.ns  ns:algo  nstype:protocol  license:GPL  comment:"Basic types"
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static RE_DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

static RE_LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Tags with this prefix are summary lines `acr` appends to every run.
const REPORT_PREFIX: &str = "report.";

/// Key under which [`parse_tuple_output`] stores the type tag.
pub const TYPE_KEY: &str = "_type";

/// One flat record as returned by [`parse_tuple_output`].
pub type Record = BTreeMap<String, String>;

/// One parsed tuple line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleRecord {
    /// Dotted entity kind, e.g. `dmmeta.ns`
    pub type_tag: String,
    pub attributes: BTreeMap<String, String>,
}

/// Parse one tuple line. Blank lines and `#` comments yield `None`.
///
/// Tokens without a `:` are ignored; a repeated key keeps its last value.
pub fn parse_tuple_line(line: &str) -> Option<TupleRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = RE_DELIMITER.split(line);
    let type_tag = parts.next()?.to_string();

    let mut attributes = BTreeMap::new();
    for part in parts {
        let Some((key, raw)) = part.split_once(':') else {
            continue;
        };
        attributes.insert(key.to_string(), unquote(raw).to_string());
    }

    Some(TupleRecord {
        type_tag,
        attributes,
    })
}

/// Parse a complete tool output blob into flat records.
///
/// Each record carries the type tag under [`TYPE_KEY`]; the tag overrides a
/// real attribute of the same name. `report.*` lines are dropped.
pub fn parse_tuple_output(text: &str) -> Vec<Record> {
    split_lines(text)
        .into_iter()
        .filter_map(parse_tuple_line)
        .filter(|rec| !rec.type_tag.starts_with(REPORT_PREFIX))
        .map(|rec| {
            let mut record = rec.attributes;
            record.insert(TYPE_KEY.to_string(), rec.type_tag);
            record
        })
        .collect()
}

/// Split on `\r\n`, `\n` or a lone `\r`. A trailing break adds no empty line.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = RE_LINE_BREAK.split(text).collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Strip one pair of surrounding double quotes.
fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(line: &str) -> BTreeMap<String, String> {
        parse_tuple_line(line).expect("record").attributes
    }

    #[test]
    fn simple_record() {
        let rec = parse_tuple_line(
            r#"dmmeta.ns  ns:algo  nstype:protocol  license:GPL  comment:"Basic types""#,
        )
        .unwrap();
        assert_eq!(rec.type_tag, "dmmeta.ns");
        assert_eq!(rec.attributes["ns"], "algo");
        assert_eq!(rec.attributes["nstype"], "protocol");
        assert_eq!(rec.attributes["license"], "GPL");
        assert_eq!(rec.attributes["comment"], "Basic types");
    }

    #[test]
    fn single_space_does_not_split() {
        let a = attrs("dmmeta.ns  ns:acr  nstype:exe  comment:Algo Cross-Reference");
        assert_eq!(a["ns"], "acr");
        assert_eq!(a["comment"], "Algo Cross-Reference");
    }

    #[test]
    fn wide_delimiters() {
        let a = attrs("dmmeta.field     field:algo.Bool.value      arg:u8");
        assert_eq!(a["field"], "algo.Bool.value");
        assert_eq!(a["arg"], "u8");
    }

    #[test]
    fn empty_quoted_values() {
        let a = attrs(r#"dmmeta.ns  ns:""  nstype:protocol  comment:"""#);
        assert_eq!(a["ns"], "");
        assert_eq!(a["comment"], "");
    }

    #[test]
    fn lone_quote_is_kept() {
        let a = attrs(r#"dmmeta.ns  ns:""#);
        assert_eq!(a["ns"], "\"");
    }

    #[test]
    fn only_first_colon_splits_key() {
        let a = attrs("dmmeta.field  field:algo.Bool.value  dflt:a:b");
        assert_eq!(a["dflt"], "a:b");
    }

    #[test]
    fn no_unescaping_inside_quotes() {
        let a = attrs(r#"dmmeta.ns  comment:"a\"b""#);
        assert_eq!(a["comment"], r#"a\"b"#);
    }

    #[test]
    fn token_without_colon_is_skipped() {
        let a = attrs("dmmeta.ns  ns:algo  garbage  nstype:exe");
        assert_eq!(a.len(), 2);
        assert!(!a.contains_key("garbage"));
    }

    #[test]
    fn repeated_key_last_wins() {
        let a = attrs("dmmeta.ns  ns:first  ns:second");
        assert_eq!(a["ns"], "second");
    }

    #[test]
    fn tag_only_line() {
        let rec = parse_tuple_line("dmmeta.ns").unwrap();
        assert_eq!(rec.type_tag, "dmmeta.ns");
        assert!(rec.attributes.is_empty());
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(parse_tuple_line(""), None);
        assert_eq!(parse_tuple_line("   "), None);
        assert_eq!(parse_tuple_line("# this is a comment"), None);
        assert_eq!(parse_tuple_line("   # indented comment"), None);
    }

    #[test]
    fn output_filters_report_lines() {
        let text = "dmmeta.ns  ns:algo  nstype:protocol  license:GPL  comment:\"\"\n\
                    dmmeta.ns  ns:acr  nstype:exe  license:GPL  comment:\"\"\n\
                    report.acr  n_select:2  n_insert:0  n_delete:0  n_ignore:0  n_update:0  n_file_mod:0\n";
        let records = parse_tuple_output(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["_type"], "dmmeta.ns");
        assert_eq!(records[0]["ns"], "algo");
        assert_eq!(records[1]["ns"], "acr");
        assert!(records.iter().all(|r| r["_type"] != "report.acr"));
    }

    #[test]
    fn output_only_report() {
        assert!(parse_tuple_output("report.acr  n_select:0  n_insert:0\n").is_empty());
    }

    #[test]
    fn output_empty() {
        assert!(parse_tuple_output("").is_empty());
        assert!(parse_tuple_output("\n\n").is_empty());
    }

    #[test]
    fn type_tag_overrides_type_attribute() {
        let records = parse_tuple_output("dmmeta.ns  _type:bogus  ns:algo");
        assert_eq!(records[0]["_type"], "dmmeta.ns");
        assert_eq!(records[0]["ns"], "algo");
    }

    #[test]
    fn crlf_output() {
        let records = parse_tuple_output("dmmeta.ns  ns:algo\r\ndmmeta.ns  ns:acr\r\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["ns"], "acr");
    }

    #[test]
    fn lone_carriage_return_splits_records() {
        let records = parse_tuple_output("dmmeta.ns  ns:a\rdmmeta.ns  ns:b\r");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["ns"], "a");
        assert_eq!(records[1]["ns"], "b");
    }

    #[test]
    fn line_breaks() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), ["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n\nb\n"), ["a", "", "b"]);
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("\r\n"), [""]);
    }
}
