//! Discovery and parsing of amc-generated headers under `include/gen/`.

use crate::error::HeaderError;
use acr_syntax::{parse_header, ParsedFunction};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Header content beyond this many bytes is cut off in tool responses.
pub const MAX_HEADER_BYTES: usize = 50_000;

/// Existing generated headers for `namespace`, `.h` before `.inl.h`.
pub fn list_generated_headers(work_dir: &Path, namespace: &str) -> Vec<PathBuf> {
    let gen_dir = work_dir.join("include").join("gen");
    [
        format!("{namespace}_gen.h"),
        format!("{namespace}_gen.inl.h"),
    ]
    .into_iter()
    .map(|name| gen_dir.join(name))
    .filter(|path| path.is_file())
    .collect()
}

/// `path` relative to `work_dir` when it lies inside it, otherwise unchanged.
pub fn display_path(path: &Path, work_dir: &Path) -> String {
    path.strip_prefix(work_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCode {
    pub path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<usize>,
    pub content: String,
}

/// Read a header given relative to `work_dir`. The resolved file, symlinks
/// included, must lie inside `work_dir`.
pub fn read_generated_header(work_dir: &Path, header_path: &str) -> Result<GeneratedCode, HeaderError> {
    let full = work_dir.join(header_path);
    if !full.is_file() {
        return Err(HeaderError::NotFound { path: full });
    }
    let canonical = |path: &Path| {
        std::fs::canonicalize(path).map_err(|source| HeaderError::Read {
            path: path.to_path_buf(),
            source,
        })
    };
    if !canonical(&full)?.starts_with(canonical(work_dir)?) {
        tracing::warn!(header = header_path, "header path outside work dir");
        return Err(HeaderError::OutsideWorkDir {
            path: PathBuf::from(header_path),
        });
    }
    let bytes = std::fs::read(&full).map_err(|source| HeaderError::Read {
        path: full.clone(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(GeneratedCode::truncated(header_path, text, MAX_HEADER_BYTES))
}

impl GeneratedCode {
    /// Keep at most `limit` bytes of `content`, cut back to a char boundary.
    pub fn truncated(path: &str, mut content: String, limit: usize) -> Self {
        let total = content.len();
        if total <= limit {
            return Self {
                path: path.to_string(),
                truncated: false,
                total_bytes: None,
                content,
            };
        }
        let mut cut = limit;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
        Self {
            path: path.to_string(),
            truncated: true,
            total_bytes: Some(total),
            content,
        }
    }
}

// -- Namespace API listing ----------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumEntry {
    pub name: String,
    pub schema_tag: String,
    pub value_count: usize,
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructEntry {
    pub name: String,
    pub schema_tag: String,
    pub comment: String,
    pub field_count: usize,
    pub member_function_count: usize,
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunctionEntry {
    #[serde(flatten)]
    pub function: ParsedFunction,
    pub header: String,
}

/// Combined enums, structs and free functions over every generated header
/// of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceApi {
    pub namespace: String,
    pub headers_parsed: Vec<String>,
    pub total_enums: usize,
    pub total_structs: usize,
    pub total_functions: usize,
    pub enums: Vec<EnumEntry>,
    pub structs: Vec<StructEntry>,
    pub functions: Vec<FunctionEntry>,
}

pub fn collect_namespace_api(work_dir: &Path, namespace: &str) -> Result<NamespaceApi, HeaderError> {
    let headers = list_generated_headers(work_dir, namespace);
    if headers.is_empty() {
        return Err(HeaderError::NoHeaders {
            namespace: namespace.to_string(),
        });
    }

    let mut api = NamespaceApi {
        namespace: namespace.to_string(),
        ..Default::default()
    };
    for path in headers {
        let text = std::fs::read(&path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|source| HeaderError::Read {
                path: path.clone(),
                source,
            })?;
        let parsed = parse_header(&text, Some(&path));
        let rel = display_path(&path, work_dir);
        tracing::debug!(
            header = %rel,
            enums = parsed.enums.len(),
            structs = parsed.structs.len(),
            functions = parsed.functions.len(),
            "parsed header"
        );

        api.total_enums += parsed.enums.len();
        api.total_structs += parsed.structs.len();
        api.total_functions += parsed.functions.len();
        api.enums.extend(parsed.enums.into_iter().map(|e| EnumEntry {
            value_count: e.values.len(),
            name: e.name,
            schema_tag: e.schema_tag,
            header: rel.clone(),
        }));
        api.structs.extend(parsed.structs.into_iter().map(|s| StructEntry {
            field_count: s.fields.len(),
            member_function_count: s.member_functions.len(),
            name: s.name,
            schema_tag: s.schema_tag,
            comment: s.comment,
            header: rel.clone(),
        }));
        api.functions.extend(parsed.functions.into_iter().map(|function| FunctionEntry {
            function,
            header: rel.clone(),
        }));
        api.headers_parsed.push(rel);
    }
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "\
enum demo_ColorEnum {        // demo.Item.color
     demo_Color_red    = 0
    ,demo_Color_green  = 1
};

struct Item { // demo.Item: A thing
    u32   id;      //   0
    // func:demo.Item..Ctor
    inline               Item() __attribute__((nothrow));
};

// Reset all fields
// func:demo.Item..Init
void                 Item_Init(demo::Item& parent);
";

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let gen = dir.path().join("include/gen");
        fs::create_dir_all(&gen).unwrap();
        for (name, body) in files {
            fs::write(gen.join(name), body).unwrap();
        }
        dir
    }

    #[test]
    fn lists_existing_headers_in_order() {
        let dir = project(&[("demo_gen.inl.h", ""), ("demo_gen.h", ""), ("other_gen.h", "")]);
        let found: Vec<String> = list_generated_headers(dir.path(), "demo")
            .iter()
            .map(|p| display_path(p, dir.path()))
            .collect();
        assert_eq!(found, ["include/gen/demo_gen.h", "include/gen/demo_gen.inl.h"]);
    }

    #[test]
    fn lists_nothing_for_unknown_namespace() {
        let dir = project(&[]);
        assert!(list_generated_headers(dir.path(), "nope").is_empty());
    }

    #[test]
    fn reads_small_header_whole() {
        let dir = project(&[("demo_gen.h", HEADER)]);
        let code = read_generated_header(dir.path(), "include/gen/demo_gen.h").unwrap();
        assert!(!code.truncated);
        assert_eq!(code.content, HEADER);
        let value = serde_json::to_value(&code).unwrap();
        assert!(value.get("truncated").is_none());
        assert!(value.get("total_bytes").is_none());
    }

    #[test]
    fn truncates_large_header() {
        let body = "x".repeat(MAX_HEADER_BYTES + 10);
        let dir = project(&[("big_gen.h", &body)]);
        let code = read_generated_header(dir.path(), "include/gen/big_gen.h").unwrap();
        assert!(code.truncated);
        assert_eq!(code.total_bytes, Some(MAX_HEADER_BYTES + 10));
        assert_eq!(code.content.len(), MAX_HEADER_BYTES);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let content = format!("{}é", "a".repeat(MAX_HEADER_BYTES - 1));
        let code = GeneratedCode::truncated("x", content, MAX_HEADER_BYTES);
        assert!(code.truncated);
        assert_eq!(code.content.len(), MAX_HEADER_BYTES - 1);
    }

    #[test]
    fn missing_header() {
        let dir = project(&[]);
        let err = read_generated_header(dir.path(), "include/gen/nope_gen.h").unwrap_err();
        assert!(matches!(err, HeaderError::NotFound { .. }));
    }

    #[test]
    fn header_outside_work_dir_is_refused() {
        let outer = tempfile::tempdir().unwrap();
        fs::write(outer.path().join("secret.h"), "struct Secret;\n").unwrap();
        let work = outer.path().join("work");
        fs::create_dir_all(work.join("include/gen")).unwrap();

        let err = read_generated_header(&work, "../secret.h").unwrap_err();
        assert!(matches!(err, HeaderError::OutsideWorkDir { .. }));
        assert_eq!(err.to_string(), "Header path escapes the work dir: ../secret.h");

        let absolute = outer.path().join("secret.h");
        let err = read_generated_header(&work, &absolute.to_string_lossy()).unwrap_err();
        assert!(matches!(err, HeaderError::OutsideWorkDir { .. }));

        let err = read_generated_header(&work, "include/gen/../../../secret.h").unwrap_err();
        assert!(matches!(err, HeaderError::OutsideWorkDir { .. }));
    }

    #[test]
    fn dot_segments_inside_work_dir_are_allowed() {
        let dir = project(&[("demo_gen.h", HEADER)]);
        let code = read_generated_header(dir.path(), "include/../include/gen/demo_gen.h").unwrap();
        assert_eq!(code.content, HEADER);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_work_dir_is_refused() {
        let outer = tempfile::tempdir().unwrap();
        fs::write(outer.path().join("secret.h"), "x\n").unwrap();
        let dir = project(&[]);
        let link = dir.path().join("include/gen/link_gen.h");
        std::os::unix::fs::symlink(outer.path().join("secret.h"), link).unwrap();
        let err = read_generated_header(dir.path(), "include/gen/link_gen.h").unwrap_err();
        assert!(matches!(err, HeaderError::OutsideWorkDir { .. }));
    }

    #[test]
    fn namespace_api_combines_headers() {
        let dir = project(&[("demo_gen.h", HEADER), ("demo_gen.inl.h", "// nothing\n")]);
        let api = collect_namespace_api(dir.path(), "demo").unwrap();
        assert_eq!(api.headers_parsed, ["include/gen/demo_gen.h", "include/gen/demo_gen.inl.h"]);
        assert_eq!((api.total_enums, api.total_structs, api.total_functions), (1, 1, 1));
        assert_eq!(api.enums[0].value_count, 2);
        assert_eq!(api.enums[0].schema_tag, "demo.Item.color");
        assert_eq!(api.structs[0].field_count, 1);
        assert_eq!(api.structs[0].member_function_count, 1);
        assert_eq!(api.functions[0].function.name, "Item_Init");
        assert_eq!(api.functions[0].function.comment, "Reset all fields");

        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(value["functions"][0]["schema_tag"], "demo.Item..Init");
        assert_eq!(value["functions"][0]["header"], "include/gen/demo_gen.h");
    }

    #[test]
    fn namespace_api_without_headers() {
        let dir = project(&[]);
        let err = collect_namespace_api(dir.path(), "demo").unwrap_err();
        assert_eq!(err.to_string(), "No generated headers found for namespace 'demo'");
    }
}
