//! JSON renderers: structured output for tooling integration.

use crate::render::Renderer;
use acr_syntax::{HeaderSummary, ParsedHeader, Record};
use anyhow::Result;
use serde::Serialize;

pub struct JsonRenderer;

/// Counts plus compact listings; member functions are only counted.
pub struct SummaryRenderer;

fn pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

impl Renderer<[ParsedHeader]> for JsonRenderer {
    fn render(&self, headers: &[ParsedHeader]) -> Result<String> {
        pretty(headers)
    }
}

impl Renderer<[Record]> for JsonRenderer {
    fn render(&self, records: &[Record]) -> Result<String> {
        pretty(records)
    }
}

impl Renderer<[ParsedHeader]> for SummaryRenderer {
    fn render(&self, headers: &[ParsedHeader]) -> Result<String> {
        let summaries: Vec<HeaderSummary<'_>> = headers.iter().map(ParsedHeader::summary).collect();
        pretty(&summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_syntax::parse_header;
    use serde_json::Value;

    const HEADER: &str = "\
struct Bool { // algo.Bool
    u8   value;   //   false
    // func:algo.Bool..Ctor
    inline               Bool() __attribute__((nothrow));
};
";

    #[test]
    fn full_json_keeps_member_functions() {
        let headers = vec![parse_header(HEADER, None)];
        let out = JsonRenderer.render(&headers[..]).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v[0]["structs"][0]["member_functions"][0]["name"], "Bool");
        assert_eq!(v[0]["structs"][0]["fields"][0]["type"], "u8");
    }

    #[test]
    fn summary_only_counts_members() {
        let headers = vec![parse_header(HEADER, None)];
        let out = SummaryRenderer.render(&headers[..]).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v[0]["struct_count"], 1);
        assert_eq!(v[0]["structs"][0]["member_function_count"], 1);
        assert!(v[0]["structs"][0].get("member_functions").is_none());
        assert!(v[0].get("enums").is_none());
    }
}
