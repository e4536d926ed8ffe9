//! Tool catalogue and dispatch.
//!
//! Each tool maps onto one or a few [`AcrClient`] calls or header lookups and
//! returns a JSON value. A failed toolchain command is still a normal result
//! (`{"ok": false, ...}`); only [`ToolError`]s are reported as tool errors.

use crate::authoring;
use crate::client::{AcrClient, AcrResult};
use crate::error::ToolError;
use crate::headers;
use crate::protocol::ToolDefinition;
use acr_syntax::Record;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

const MAX_CHECK_ERRORS: usize = 50;
const AMC_OUTPUT_CHARS: usize = 2000;
const ABT_OUTPUT_CHARS: usize = 5000;

// -- Definitions --------------------------------------------------------------

/// `(name, type, description)` of one argument.
pub(crate) type Prop = (&'static str, &'static str, &'static str);

pub(crate) fn tool(
    name: &'static str,
    description: &'static str,
    props: &[Prop],
    required: &[&str],
) -> ToolDefinition {
    let properties: serde_json::Map<String, Value> = props
        .iter()
        .map(|&(prop, ty, desc)| {
            let mut schema = json!({"type": ty, "description": desc});
            if ty == "array" {
                schema["items"] = json!({"type": "string"});
            }
            (prop.to_string(), schema)
        })
        .collect();
    ToolDefinition {
        name,
        description,
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

pub(crate) const NAMESPACE: Prop = ("namespace", "string", "Namespace, e.g. \"algo\" or \"dmmeta\"");
pub(crate) const CTYPE: Prop = ("ctype", "string", "Ctype name, e.g. \"algo.Bool\"");
const PATTERN: Prop = ("pattern", "string", "acr query pattern, e.g. \"dmmeta.ctype:algo.%\"");
const LEVELS: Prop = ("levels", "integer", "Levels to traverse (1-100, default 1)");
pub(crate) const TARGET: Prop = ("target", "string", "Target namespace, e.g. \"acr\"");

/// Every tool the server advertises, in `tools/list` order: queries,
/// record edits, schema authoring, then code generation and headers.
pub fn definitions() -> Vec<ToolDefinition> {
    let mut defs = vec![
        tool(
            "set_project",
            "Switch to a standalone project directory; an empty path returns to the OpenACR tree.",
            &[("path", "string", "Project directory containing data/dmmeta and bin/")],
            &[],
        ),
        tool("list_namespaces", "List all OpenACR namespaces.", &[], &[]),
        tool(
            "get_namespace_tree",
            "Full cross-reference tree of a namespace (acr -t).",
            &[NAMESPACE],
            &["namespace"],
        ),
        tool("list_ctypes", "List all ctypes in a namespace.", &[NAMESPACE], &["namespace"]),
        tool(
            "get_ctype",
            "Ctype detail with cross-references (tree view).",
            &[CTYPE],
            &["ctype"],
        ),
        tool("list_fields", "List all fields of a ctype.", &[CTYPE], &["ctype"]),
        tool("query", "Run a raw acr query.", &[PATTERN], &["pattern"]),
        tool(
            "search",
            "Search ctype names, field names, field types and comments.",
            &[("text", "string", "Text to search for")],
            &["text"],
        ),
        tool(
            "list_fconsts",
            "List enum constants of a namespace, or of one ctype.",
            &[NAMESPACE, ("ctype", "string", "Optional ctype filter, e.g. \"dev.Mdmark\"")],
            &["namespace"],
        ),
        tool(
            "list_ssimfiles",
            "List the ssimfiles (data tables) of a namespace.",
            &[NAMESPACE],
            &["namespace"],
        ),
        tool(
            "list_finputs",
            "List the tables an executable loads at startup.",
            &[TARGET],
            &["target"],
        ),
        tool(
            "get_downstream",
            "Records that depend on the matched records (acr -ndown).",
            &[PATTERN, LEVELS],
            &["pattern"],
        ),
        tool(
            "get_upstream",
            "Records the matched records refer to (acr -nup).",
            &[PATTERN, LEVELS],
            &["pattern"],
        ),
        tool(
            "find_unused",
            "Matched records that nothing references.",
            &[PATTERN],
            &["pattern"],
        ),
        tool(
            "validate_schema",
            "Run referential integrity checks (acr -check).",
            &[("pattern", "string", "Scope of the check (default \"%\")")],
            &[],
        ),
        tool(
            "get_record_meta",
            "Ctype and field records describing the matched records (acr -meta).",
            &[PATTERN],
            &["pattern"],
        ),
        tool(
            "select_fields",
            "Run a query printing only the given attributes.",
            &[PATTERN, ("fields", "array", "Attribute names, e.g. [\"field\", \"arg\"]")],
            &["pattern", "fields"],
        ),
        tool(
            "get_input_tables",
            "Every ssimfile a target reads at runtime, transitively (acr_in).",
            &[TARGET],
            &["target"],
        ),
        tool(
            "visualize_ctype",
            "ASCII diagram of a ctype's fields and references (amc_vis).",
            &[CTYPE],
            &["ctype"],
        ),
        tool(
            "insert_record",
            "Insert one ssim record and write it back to disk.",
            &[("line", "string", "ssim tuple line, e.g. \"dmmeta.ns  ns:demo  nstype:exe\"")],
            &["line"],
        ),
        tool(
            "delete_record",
            "Delete the records matching a pattern.",
            &[PATTERN],
            &["pattern"],
        ),
    ];
    defs.extend(authoring::definitions());
    defs.extend([
        tool(
            "run_amc",
            "Regenerate C++ code from the schema.",
            &[("namespace", "string", "Namespace to regenerate (empty = all)")],
            &[],
        ),
        tool("run_abt", "Build a target with abt.", &[TARGET], &["target"]),
        tool(
            "list_generated_headers",
            "List the generated headers of a namespace.",
            &[NAMESPACE],
            &["namespace"],
        ),
        tool(
            "get_generated_code",
            "Contents of a generated header (truncated to 50KB).",
            &[(
                "header_path",
                "string",
                "Path relative to the work dir, e.g. \"include/gen/algo_gen.h\"",
            )],
            &["header_path"],
        ),
        tool(
            "get_functions",
            "Enums, structs and function signatures from a namespace's generated headers.",
            &[NAMESPACE],
            &["namespace"],
        ),
    ]);
    defs
}

// -- Arguments ----------------------------------------------------------------

#[derive(Deserialize)]
struct PathArgs {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct NamespaceArgs {
    namespace: String,
}

#[derive(Deserialize)]
struct CtypeArgs {
    ctype: String,
}

#[derive(Deserialize)]
struct PatternArgs {
    pattern: String,
}

#[derive(Deserialize)]
struct SelectArgs {
    pattern: String,
    fields: Vec<String>,
}

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Deserialize)]
struct FconstArgs {
    namespace: String,
    #[serde(default)]
    ctype: String,
}

#[derive(Deserialize)]
struct TargetArgs {
    target: String,
}

#[derive(Deserialize)]
struct TraverseArgs {
    pattern: String,
    #[serde(default = "one")]
    levels: i64,
}

fn one() -> i64 {
    1
}

#[derive(Deserialize)]
struct CheckArgs {
    #[serde(default = "everything")]
    pattern: String,
}

fn everything() -> String {
    "%".to_string()
}

#[derive(Deserialize)]
struct LineArgs {
    line: String,
}

#[derive(Deserialize)]
struct AmcArgs {
    #[serde(default)]
    namespace: String,
}

#[derive(Deserialize)]
struct HeaderPathArgs {
    header_path: String,
}

pub(crate) fn parse<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: err.to_string(),
    })
}

// -- Dispatch -----------------------------------------------------------------

/// Owns the client; `set_project` mutates its work dir.
#[derive(Debug)]
pub struct Toolbox {
    client: AcrClient,
}

impl Toolbox {
    pub fn new(client: AcrClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AcrClient {
        &self.client
    }

    /// Run tool `name`. Missing arguments count as an empty object.
    pub async fn call(&mut self, name: &str, arguments: Option<Value>) -> Result<Value, ToolError> {
        let args = arguments.unwrap_or_else(|| json!({}));
        tracing::debug!(tool = name, "tool call");

        if name == "set_project" {
            let a: PathArgs = parse(name, args)?;
            let dir = (!a.path.is_empty()).then(|| Path::new(&a.path));
            let work_dir = self.client.set_work_dir(dir)?;
            return Ok(json!({"ok": true, "work_dir": work_dir.display().to_string()}));
        }

        let client = &self.client;
        let value = match name {
            "list_namespaces" => client.list_namespaces().await.to_json(),
            "get_namespace_tree" => {
                let a: NamespaceArgs = parse(name, args)?;
                let result = client.acr(&format!("dmmeta.ns:{}", a.namespace), true).await;
                if result.ok {
                    json!({"ok": true, "namespace": a.namespace, "tree": result.stdout})
                } else {
                    result.to_json()
                }
            }
            "list_ctypes" => {
                let a: NamespaceArgs = parse(name, args)?;
                client.list_ctypes(&a.namespace).await.to_json()
            }
            "get_ctype" => {
                let a: CtypeArgs = parse(name, args)?;
                let result = client.get_ctype(&a.ctype).await;
                if result.ok {
                    json!({"ok": true, "tree": result.stdout})
                } else {
                    result.to_json()
                }
            }
            "list_fields" => {
                let a: CtypeArgs = parse(name, args)?;
                client.list_fields(&a.ctype).await.to_json()
            }
            "query" => {
                let a: PatternArgs = parse(name, args)?;
                client.acr(&a.pattern, false).await.to_json()
            }
            "search" => {
                let a: TextArgs = parse(name, args)?;
                search(client, &a.text).await
            }
            "list_fconsts" => {
                let a: FconstArgs = parse(name, args)?;
                let scope = if a.ctype.is_empty() { &a.namespace } else { &a.ctype };
                client
                    .acr(&format!("dmmeta.fconst:{scope}.%"), false)
                    .await
                    .to_json()
            }
            "list_ssimfiles" => {
                let a: NamespaceArgs = parse(name, args)?;
                client
                    .acr(&format!("dmmeta.ssimfile:{}.%", a.namespace), false)
                    .await
                    .to_json()
            }
            "list_finputs" => {
                let a: TargetArgs = parse(name, args)?;
                client
                    .acr(&format!("dmmeta.finput:{}.%", a.target), false)
                    .await
                    .to_json()
            }
            "get_downstream" => {
                let a: TraverseArgs = parse(name, args)?;
                client.acr_ndown(&a.pattern, clamp_levels(a.levels)).await.to_json()
            }
            "get_upstream" => {
                let a: TraverseArgs = parse(name, args)?;
                client.acr_nup(&a.pattern, clamp_levels(a.levels)).await.to_json()
            }
            "find_unused" => {
                let a: PatternArgs = parse(name, args)?;
                client.acr_unused(&a.pattern).await.to_json()
            }
            "validate_schema" => {
                let a: CheckArgs = parse(name, args)?;
                let result = client.acr_check(&a.pattern).await;
                check_report(&a.pattern, &result)
            }
            "get_record_meta" => {
                let a: PatternArgs = parse(name, args)?;
                client.acr_meta(&a.pattern).await.to_json()
            }
            "select_fields" => {
                let a: SelectArgs = parse(name, args)?;
                if a.fields.is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool: name.to_string(),
                        reason: "Must specify at least one field to project".to_string(),
                    });
                }
                let result = client.acr_select_fields(&a.pattern, &a.fields).await;
                if result.ok {
                    json!({
                        "ok": true,
                        "output": result.stdout,
                        "pattern": a.pattern,
                        "fields": a.fields,
                    })
                } else {
                    result.to_json()
                }
            }
            "get_input_tables" => {
                let a: TargetArgs = parse(name, args)?;
                client.acr_in(&a.target).await.to_json()
            }
            "visualize_ctype" => {
                let a: CtypeArgs = parse(name, args)?;
                let result = client.amc_vis(&a.ctype).await;
                if result.ok {
                    json!({"ok": true, "ctype": a.ctype, "diagram": result.stdout})
                } else {
                    result.to_json()
                }
            }
            "insert_record" => {
                let a: LineArgs = parse(name, args)?;
                client.acr_insert(&a.line).await.to_json()
            }
            "delete_record" => {
                let a: PatternArgs = parse(name, args)?;
                client.acr_delete(&a.pattern).await.to_json()
            }
            "run_amc" => {
                let a: AmcArgs = parse(name, args)?;
                build_report(&client.amc(&a.namespace).await, AMC_OUTPUT_CHARS)
            }
            "run_abt" => {
                let a: TargetArgs = parse(name, args)?;
                build_report(&client.abt(&a.target).await, ABT_OUTPUT_CHARS)
            }
            "list_generated_headers" => {
                let a: NamespaceArgs = parse(name, args)?;
                let work_dir = client.work_dir();
                let found: Vec<String> = headers::list_generated_headers(work_dir, &a.namespace)
                    .iter()
                    .map(|p| headers::display_path(p, work_dir))
                    .collect();
                json!({"namespace": a.namespace, "count": found.len(), "headers": found})
            }
            "get_generated_code" => {
                let a: HeaderPathArgs = parse(name, args)?;
                let code = headers::read_generated_header(client.work_dir(), &a.header_path)?;
                to_value(&code)?
            }
            "get_functions" => {
                let a: NamespaceArgs = parse(name, args)?;
                let api = headers::collect_namespace_api(client.work_dir(), &a.namespace)?;
                to_value(&api)?
            }
            _ => return authoring::call(client, name, args).await,
        };
        Ok(value)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|err| ToolError::Failed(err.to_string()))
}

fn clamp_levels(levels: i64) -> u32 {
    levels.clamp(1, 100) as u32
}

/// Name matches first, then any field whose comment or type mentions `text`.
async fn search(client: &AcrClient, text: &str) -> Value {
    let mut ctypes: Vec<Record> = Vec::new();
    let mut fields: Vec<Record> = Vec::new();

    let by_name = client.acr(&format!("dmmeta.ctype:%{text}%"), false).await;
    if by_name.ok {
        ctypes = by_name.records;
    }

    let by_field = client.acr(&format!("dmmeta.field:%.{text}%"), false).await;
    if by_field.ok {
        fields.extend(by_field.records);
    }

    let all_fields = client.acr("dmmeta.field:%", false).await;
    if all_fields.ok {
        let needle = text.to_lowercase();
        let mentions = |rec: &Record, key: &str| {
            rec.get(key)
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };
        for rec in all_fields.records {
            if (mentions(&rec, "comment") || mentions(&rec, "arg")) && !fields.contains(&rec) {
                fields.push(rec);
            }
        }
    }

    json!({
        "query": text,
        "ctype_count": ctypes.len(),
        "field_count": fields.len(),
        "ctypes": ctypes,
        "fields": fields,
    })
}

/// `acr -check` reports problems on stderr, one per line.
fn check_report(pattern: &str, result: &AcrResult) -> Value {
    if result.ok {
        return json!({"ok": true, "message": "Schema validation passed", "pattern": pattern});
    }
    let errors: Vec<&str> = result
        .stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("report."))
        .collect();
    json!({
        "ok": false,
        "pattern": pattern,
        "error_count": errors.len(),
        "errors": &errors[..errors.len().min(MAX_CHECK_ERRORS)],
    })
}

fn build_report(result: &AcrResult, limit: usize) -> Value {
    json!({
        "ok": result.ok,
        "stdout": head_chars(&result.stdout, limit),
        "stderr": head_chars(&result.stderr, limit),
    })
}

fn head_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_are_unique_and_well_formed() {
        let defs = definitions();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), defs.len());
        assert_eq!(defs.len(), 45);
        for def in &defs {
            assert_eq!(def.input_schema["type"], "object");
            for req in def.input_schema["required"].as_array().unwrap() {
                let req = req.as_str().unwrap();
                assert!(
                    def.input_schema["properties"].get(req).is_some(),
                    "{}: required {req} has no property",
                    def.name
                );
            }
        }
    }

    #[test]
    fn levels_are_clamped() {
        assert_eq!(clamp_levels(-5), 1);
        assert_eq!(clamp_levels(0), 1);
        assert_eq!(clamp_levels(7), 7);
        assert_eq!(clamp_levels(1000), 100);
    }

    #[test]
    fn check_report_filters_and_caps() {
        let stderr: String = (0..60)
            .map(|i| format!("acr.check  error:{i}\n"))
            .chain(["report.acr  n_select:0\n".to_string(), "\n".to_string()])
            .collect();
        let result = AcrResult {
            ok: false,
            stderr,
            returncode: 1,
            ..Default::default()
        };
        let value = check_report("%", &result);
        assert_eq!(value["ok"], false);
        assert_eq!(value["error_count"], 60);
        assert_eq!(value["errors"].as_array().unwrap().len(), 50);
        assert_eq!(value["errors"][0], "acr.check  error:0");
    }

    #[test]
    fn check_report_passes() {
        let result = AcrResult {
            ok: true,
            ..Default::default()
        };
        assert_eq!(check_report("%", &result)["message"], "Schema validation passed");
    }

    #[test]
    fn head_chars_counts_characters() {
        assert_eq!(head_chars("héllo", 2), "hé");
        assert_eq!(head_chars("abc", 10), "abc");
        assert_eq!(head_chars("", 3), "");
    }

    #[test]
    fn build_report_caps_output() {
        let result = AcrResult {
            ok: true,
            stdout: "x".repeat(ABT_OUTPUT_CHARS + 1),
            ..Default::default()
        };
        let value = build_report(&result, ABT_OUTPUT_CHARS);
        assert_eq!(value["stdout"].as_str().unwrap().len(), ABT_OUTPUT_CHARS);
        assert_eq!(value["stderr"], "");
    }

    #[test]
    fn array_arguments_declare_items() {
        let defs = definitions();
        let select = defs.iter().find(|d| d.name == "select_fields").unwrap();
        assert_eq!(select.input_schema["properties"]["fields"]["items"]["type"], "string");
    }

    #[test]
    fn bad_arguments() {
        let err = parse::<NamespaceArgs>("list_ctypes", json!({})).unwrap_err();
        assert!(err.to_string().starts_with("invalid arguments for tool list_ctypes"));
    }
}
