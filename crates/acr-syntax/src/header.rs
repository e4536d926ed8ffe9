//! amc-generated header parser: anchor-line scanner, no AST.
//!
//! amc emits headers in a fixed textual convention:
//!
//! - Enums: `enum algo_BoolEnum {        // algo.Bool.value` then `,name = value` lines
//! - Structs: `struct Name { // ns.Name: comment` then fields and member functions
//! - Functions: a `// func:ns.Name.field.Op` line right before the signature
//! - Fields: `type  name;` with the names aligned by runs of spaces
//!
//! A single forward pass keeps a line cursor. At each position the enum,
//! struct and func-tag recognizers are tried in that order; a recognizer that
//! matches moves the cursor past what it consumed, otherwise the cursor
//! advances one line. Anything unrecognized is skipped, so arbitrary text
//! yields a (possibly empty) [`ParsedHeader`].

use crate::model::*;
use crate::ssim::split_lines;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

// enum algo_BoolEnum {        // algo.Bool.value
static RE_ENUM_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^enum\s+(\w+)\s*\{(?:\s*//\s*(.*))?$").unwrap());

// ,algo_Bool_Y       = 1
static RE_ENUM_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*,?\s*(\w+)\s*=\s*([^/\s]+)\s*(?://\s*(.*))?$").unwrap()
});

// struct Err { // acr.Err: Error record
static RE_STRUCT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^struct\s+(\w+)\s*\{\s*//\s*(\S+?)(?::\s*(.*))?$").unwrap()
});

//     algo_lib::Regx   name;    // Acr Regx
// amc aligns names with two or more spaces, but a single space is accepted.
static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+([\w:*&<>\s]+?)\s+(\w+);\s*(?://\s*(.*))?$").unwrap()
});

// // func:algo.cstring.ch.Alloc
static RE_FUNC_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*//\s*func:(\S+)\s*$").unwrap());

// inline bool          ch_EmptyQ(algo::cstring& parent) __attribute__((nothrow));
// The parameter list is not balanced: a nested `)` ends the capture.
static RE_FUNC_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:(?:inline|static|explicit|virtual)\s+)*",
        r"([\w:*&<>\s]+?)\s+",
        r"([\w:~]+(?:\s*operator\s*[^(]+)?)\s*",
        r"\(([^)]*)\)\s*",
        r"(?:const\s*)?",
        r"(?:__attribute__\(\([^)]*\)\)\s*)?;?\s*$"
    ))
    .unwrap()
});

// -- Public API ---------------------------------------------------------------

/// Parse the text of one generated header.
///
/// `path` only feeds `source_path` and the namespace derivation; no file is
/// read.
pub fn parse_header(text: &str, path: Option<&Path>) -> ParsedHeader {
    let mut scanner = Scanner {
        lines: split_lines(text),
        header: ParsedHeader::default(),
    };
    if let Some(path) = path {
        scanner.header.source_path = path.to_string_lossy().into_owned();
        scanner.header.namespace = namespace_from_path(path);
    }
    scanner.run();
    scanner.header
}

/// Match one function signature line.
///
/// Returns `(return_type, name, params)`, each trimmed.
pub fn parse_signature(line: &str) -> Option<(String, String, String)> {
    let caps = RE_FUNC_SIG.captures(line)?;
    Some((
        caps[1].trim().to_string(),
        caps[2].trim().to_string(),
        caps[3].trim().to_string(),
    ))
}

/// `include/gen/algo_gen.h` → `algo`, `acr_gen.inl.h` → `acr`, else empty.
pub fn namespace_from_path(path: &Path) -> String {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return String::new();
    };
    stem.strip_suffix("_gen")
        .or_else(|| stem.strip_suffix("_gen.inl"))
        .unwrap_or_default()
        .to_string()
}

// -- Scanner ------------------------------------------------------------------

struct Scanner<'a> {
    lines: Vec<&'a str>,
    header: ParsedHeader,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            i = self.step(i);
        }
    }

    /// Try each recognizer at line `i`; returns the next cursor position.
    fn step(&mut self, i: usize) -> usize {
        let line = self.lines[i];

        if let Some(caps) = RE_ENUM_START.captures(line) {
            if let Some((parsed, end)) = self.parse_enum(i, &caps) {
                self.header.enums.push(parsed);
                return end + 1;
            }
        }

        if let Some(caps) = RE_STRUCT_START.captures(line) {
            let (parsed, end) = self.parse_struct(i, &caps);
            self.header.structs.push(parsed);
            return end + 1;
        }

        if let Some(caps) = RE_FUNC_TAG.captures(line) {
            let tag = caps[1].to_string();
            if let Some((mut func, sig_line)) = self.function_after_tag(i, &tag) {
                func.comment = self.comment_above(i);
                self.header.functions.push(func);
                return sig_line + 1;
            }
        }

        i + 1
    }

    /// Enum body runs up to the first line containing `};`.
    /// Returns `None` (consuming nothing) when no value line was found.
    fn parse_enum(&self, start: usize, caps: &Captures) -> Option<(ParsedEnum, usize)> {
        let comment = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let mut values = Vec::new();
        let mut end = start + 1;
        while end < self.lines.len() {
            let line = self.lines[end];
            if line.contains("};") {
                break;
            }
            if let Some(vm) = RE_ENUM_VALUE.captures(line) {
                values.push(EnumValue::new(&vm[1], &vm[2]));
            }
            end += 1;
        }

        if values.is_empty() {
            return None;
        }
        Some((
            ParsedEnum {
                name: caps[1].to_string(),
                schema_tag: comment.clone(),
                comment,
                values,
            },
            end,
        ))
    }

    /// Struct body ends on the line where the brace depth returns to zero.
    /// Returns the struct and the index of that closing line.
    fn parse_struct(&self, start: usize, caps: &Captures) -> (ParsedStruct, usize) {
        let mut parsed = ParsedStruct {
            name: caps[1].to_string(),
            schema_tag: caps[2].to_string(),
            comment: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            ..Default::default()
        };

        let mut depth: i64 = 1;
        let mut i = start + 1;
        while i < self.lines.len() {
            let line = self.lines[i];
            depth += brace_delta(line);
            if depth <= 0 {
                break;
            }

            // Member functions first: a tag line must never become a field.
            if let Some(fm) = RE_FUNC_TAG.captures(line) {
                let tag = fm[1].to_string();
                if let Some((mut func, sig_line)) = self.member_after_tag(i, &tag) {
                    func.is_member = true;
                    parsed.member_functions.push(func);
                    depth += brace_delta(self.lines[sig_line]);
                    i = sig_line + 1;
                    continue;
                }
            }

            if !line.contains("func:") {
                if let Some(field) = parse_field(line) {
                    parsed.fields.push(field);
                }
            }

            i += 1;
        }

        (parsed, i)
    }

    /// Signature of a free function following a tag line at `tag_line`.
    fn function_after_tag(&self, tag_line: usize, tag: &str) -> Option<(ParsedFunction, usize)> {
        let j = self.next_non_blank(tag_line + 1)?;
        let (return_type, name, params) = parse_signature(self.lines[j])?;
        Some((
            ParsedFunction {
                schema_tag: tag.to_string(),
                return_type,
                name,
                params,
                ..Default::default()
            },
            j,
        ))
    }

    /// Like [`Self::function_after_tag`], but a closing brace ends the search.
    fn member_after_tag(&self, tag_line: usize, tag: &str) -> Option<(ParsedFunction, usize)> {
        let j = self.next_non_blank(tag_line + 1)?;
        if self.lines[j].contains('}') {
            return None;
        }
        self.function_after_tag(tag_line, tag)
    }

    fn next_non_blank(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&j| !self.lines[j].trim().is_empty())
    }

    /// Join the contiguous `//` lines directly above a tag line, top to bottom.
    /// Empty comment lines are skipped; another `func:` line stops the scan.
    fn comment_above(&self, tag_line: usize) -> String {
        let mut comments: Vec<&str> = Vec::new();
        for line in self.lines[..tag_line].iter().rev() {
            let stripped = line.trim();
            if !stripped.starts_with("//") || stripped.contains("func:") {
                break;
            }
            let text = stripped.trim_start_matches('/').trim();
            if !text.is_empty() {
                comments.push(text);
            }
        }
        comments.reverse();
        comments.join(" ")
    }
}

/// Leading words that make a `word name;` line a statement, not a field.
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "friend", "typedef", "using", "delete", "throw", "goto",
];

fn parse_field(line: &str) -> Option<ParsedField> {
    let caps = RE_FIELD.captures(line)?;
    let ty = caps[1].trim();
    let first = ty.split_whitespace().next().unwrap_or_default();
    if STATEMENT_KEYWORDS.contains(&first) {
        return None;
    }
    Some(ParsedField {
        ty: ty.to_string(),
        name: caps[2].to_string(),
        default: String::new(),
        comment: caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

/// Net brace depth change: every `{` and `}` on the line counts.
fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}
