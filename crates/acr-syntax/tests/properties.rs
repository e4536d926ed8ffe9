use acr_syntax::{parse_header, parse_tuple_line, parse_tuple_output};
use proptest::prelude::*;

/// Values with no double quote, no run of two spaces, no edge whitespace.
fn value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.:-]{1,8}( [A-Za-z0-9_.:-]{1,8}){0,3}"
}

fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,7}"
}

proptest! {
    #[test]
    fn output_is_idempotent(text in "(?s).{0,400}") {
        prop_assert_eq!(parse_tuple_output(&text), parse_tuple_output(&text));
    }

    #[test]
    fn quoted_and_bare_values_agree(k in key(), v in value()) {
        let quoted = parse_tuple_line(&format!("ns.t  {k}:\"{v}\"")).unwrap();
        let bare = parse_tuple_line(&format!("ns.t  {k}:{v}")).unwrap();
        prop_assert_eq!(&quoted.attributes[&k], &v);
        prop_assert_eq!(&bare.attributes[&k], &v);
    }

    #[test]
    fn report_lines_never_emit(rest in "[^\r\n]{0,80}") {
        let text = format!("report.{rest}\n");
        prop_assert!(parse_tuple_output(&text).is_empty());
    }

    #[test]
    fn single_spaces_never_split(k in key(), v in value()) {
        let rec = parse_tuple_line(&format!("ns.t  {k}:{v}  last9:1")).unwrap();
        prop_assert_eq!(rec.attributes.len(), 2);
        prop_assert_eq!(&rec.attributes[&k], &v);
    }

    #[test]
    fn header_parser_is_total(text in "(?s).{0,600}") {
        let h = parse_header(&text, None);
        prop_assert!(h.enums.iter().all(|e| !e.values.is_empty()));
    }

    #[test]
    fn enums_keep_source_order(names in prop::collection::vec("[A-Z][a-z]{1,6}", 1..6)) {
        let text: String = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("enum E{i}{n} {{  // ns.E{i}.value\n     E{i}{n}_A = {i}\n}};\n"))
            .collect();
        let h = parse_header(&text, None);
        let got: Vec<String> = h.enums.iter().map(|e| e.name.clone()).collect();
        let want: Vec<String> = names.iter().enumerate().map(|(i, n)| format!("E{i}{n}")).collect();
        prop_assert_eq!(got, want);
    }
}
