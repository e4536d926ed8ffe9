//! Plain-text renderer for terminals and grep.

use crate::render::Renderer;
use acr_syntax::{ssim::TYPE_KEY, ParsedFunction, ParsedHeader, Record};
use anyhow::Result;
use std::fmt::Write;

pub struct TextRenderer;

impl Renderer<[ParsedHeader]> for TextRenderer {
    fn render(&self, headers: &[ParsedHeader]) -> Result<String> {
        let mut out = String::new();
        for header in headers {
            let path = if header.source_path.is_empty() {
                "<stdin>"
            } else {
                &header.source_path
            };
            writeln!(out, "{path}")?;

            for e in &header.enums {
                writeln!(out, "  enum {}  [{}]", e.name, e.schema_tag)?;
                for v in &e.values {
                    writeln!(out, "    {} = {}", v.name, v.value)?;
                }
            }
            for s in &header.structs {
                writeln!(out, "  struct {}  [{}]", s.name, s.schema_tag)?;
                for f in &s.fields {
                    write!(out, "    {} {}", f.ty, f.name)?;
                    if !f.comment.is_empty() {
                        write!(out, "  // {}", f.comment)?;
                    }
                    out.push('\n');
                }
                for m in &s.member_functions {
                    write_function(&mut out, "    ", m)?;
                }
            }
            for f in &header.functions {
                write_function(&mut out, "  ", f)?;
            }
        }
        Ok(out)
    }
}

fn write_function(out: &mut String, indent: &str, f: &ParsedFunction) -> std::fmt::Result {
    writeln!(
        out,
        "{indent}fn {} {}({})  [{}]",
        f.return_type, f.name, f.params, f.schema_tag
    )
}

/// One record per line: type tag, then `key=value` pairs, tab separated.
impl Renderer<[Record]> for TextRenderer {
    fn render(&self, records: &[Record]) -> Result<String> {
        let mut out = String::new();
        for record in records {
            out.push_str(record.get(TYPE_KEY).map(String::as_str).unwrap_or_default());
            for (key, value) in record.iter().filter(|(k, _)| k.as_str() != TYPE_KEY) {
                write!(out, "\t{key}={value}")?;
            }
            out.push('\n');
        }
        Ok(out)
    }
}
