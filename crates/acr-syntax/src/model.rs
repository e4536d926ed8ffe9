//! Data model for parsed generated headers.

use serde::Serialize;

/// Everything recovered from one generated header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedHeader {
    pub source_path: String,
    /// Derived from the file name: `algo_gen.h` → `algo`
    pub namespace: String,
    pub enums: Vec<ParsedEnum>,
    pub structs: Vec<ParsedStruct>,
    /// Free functions only; member functions live in their struct.
    pub functions: Vec<ParsedFunction>,
}

/// `enum algo_BoolEnum {        // algo.Bool.value`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedEnum {
    pub name: String,
    pub comment: String,
    /// Same text as `comment`; amc writes the owning field there.
    pub schema_tag: String,
    /// Never empty for an emitted enum.
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name: String,
    /// Raw literal text (`0`, `0x1`), never interpreted.
    pub value: String,
}

impl EnumValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedField {
    /// Raw type text, e.g. `algo::cstring` or `acr::FCtype*`
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
    pub default: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedFunction {
    /// Tag from the `// func:<tag>` line, e.g. `algo.cstring.ch.Alloc`
    pub schema_tag: String,
    pub return_type: String,
    pub name: String,
    /// Unparsed text between the parentheses
    pub params: String,
    pub comment: String,
    pub is_member: bool,
}

/// `struct Err { // acr.Err: Error record`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedStruct {
    pub name: String,
    pub schema_tag: String,
    pub comment: String,
    pub fields: Vec<ParsedField>,
    pub member_functions: Vec<ParsedFunction>,
}

// -- Summary view -------------------------------------------------------------

/// Compact view of a [`ParsedHeader`] for tool responses: counts always
/// present, listings omitted when empty, member functions only counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderSummary<'a> {
    pub path: &'a str,
    pub namespace: &'a str,
    pub enum_count: usize,
    pub struct_count: usize,
    pub function_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumSummary<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub structs: Vec<StructSummary<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<&'a ParsedFunction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumSummary<'a> {
    pub name: &'a str,
    pub schema_tag: &'a str,
    pub comment: &'a str,
    pub value_count: usize,
    pub values: &'a [EnumValue],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructSummary<'a> {
    pub name: &'a str,
    pub schema_tag: &'a str,
    pub comment: &'a str,
    pub fields: &'a [ParsedField],
    pub member_function_count: usize,
}

impl ParsedHeader {
    pub fn summary(&self) -> HeaderSummary<'_> {
        HeaderSummary {
            path: &self.source_path,
            namespace: &self.namespace,
            enum_count: self.enums.len(),
            struct_count: self.structs.len(),
            function_count: self.functions.len(),
            enums: self
                .enums
                .iter()
                .map(|e| EnumSummary {
                    name: &e.name,
                    schema_tag: &e.schema_tag,
                    comment: &e.comment,
                    value_count: e.values.len(),
                    values: &e.values,
                })
                .collect(),
            structs: self
                .structs
                .iter()
                .map(|s| StructSummary {
                    name: &s.name,
                    schema_tag: &s.schema_tag,
                    comment: &s.comment,
                    fields: &s.fields,
                    member_function_count: s.member_functions.len(),
                })
                .collect(),
            functions: self.functions.iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.structs.is_empty() && self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_of_empty_header_has_counts_only() {
        let header = ParsedHeader::default();
        let value = serde_json::to_value(header.summary()).unwrap();
        assert_eq!(value["enum_count"], 0);
        assert_eq!(value["struct_count"], 0);
        assert_eq!(value["function_count"], 0);
        assert!(value.get("enums").is_none());
        assert!(value.get("structs").is_none());
        assert!(value.get("functions").is_none());
    }

    #[test]
    fn summary_with_data() {
        let header = ParsedHeader {
            enums: vec![ParsedEnum {
                name: "E".into(),
                values: vec![EnumValue::new("A", "0")],
                ..Default::default()
            }],
            structs: vec![ParsedStruct {
                name: "S".into(),
                schema_tag: "ns.S".into(),
                member_functions: vec![ParsedFunction::default()],
                ..Default::default()
            }],
            functions: vec![ParsedFunction {
                schema_tag: "ns.S..Init".into(),
                return_type: "void".into(),
                name: "S_Init".into(),
                params: "ns::S& parent".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let value = serde_json::to_value(header.summary()).unwrap();
        assert_eq!(value["enum_count"], 1);
        assert_eq!(value["enums"][0]["value_count"], 1);
        assert_eq!(value["enums"][0]["values"][0], json!({"name": "A", "value": "0"}));
        assert_eq!(value["structs"][0]["name"], "S");
        assert_eq!(value["structs"][0]["member_function_count"], 1);
        assert_eq!(value["functions"][0]["name"], "S_Init");
        assert_eq!(value["functions"][0]["schema_tag"], "ns.S..Init");
    }

    #[test]
    fn field_type_serializes_as_type() {
        let field = ParsedField {
            ty: "u32".into(),
            name: "id".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "u32");
    }
}
