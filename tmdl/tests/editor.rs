use pretty_assertions::assert_eq;

use tmdl::editor::body_text;
use tmdl::{
    Document, EditError, Editor, IndentUnit, Reindent, Scope, Warning, edit_named_object,
    extract_body, locate, replace_body,
};

fn edit(source: &str, keyword: &str, name: &str, body: &str) -> String {
    let doc = Document::new(source);
    edit_named_object(&doc, keyword, name, body)
        .expect("edit failed")
        .into_string()
}

const TWO_MEASURES: &str = "table Sales\n\
\tmeasure 'X' =\n\
\t\t1+1\n\
\tformatString: 0\n\
\tlineageTag: aaa\n\
\n\
\tmeasure 'Y' =\n\
\t\tVAR a = 1\n\
\t\tRETURN a\n\
\tdisplayFolder: KPIs\n";

#[test]
fn replaces_body_and_keeps_properties() {
    let out = edit("\tmeasure 'X' =\n\t\t1+1\n\tformatString: 0\n", "measure", "X", "2+2");
    assert_eq!(out, "\tmeasure 'X' =\n\t\t2+2\n\tformatString: 0\n");
}

#[test]
fn editing_one_measure_leaves_the_next_untouched() {
    let out = edit(TWO_MEASURES, "measure", "X", "SUM(Sales[Amount])");
    let expected = "table Sales\n\
\tmeasure 'X' =\n\
\t\tSUM(Sales[Amount])\n\
\tformatString: 0\n\
\tlineageTag: aaa\n\
\n\
\tmeasure 'Y' =\n\
\t\tVAR a = 1\n\
\t\tRETURN a\n\
\tdisplayFolder: KPIs\n";
    assert_eq!(out, expected);

    let y_before = &TWO_MEASURES[TWO_MEASURES.find("\tmeasure 'Y'").unwrap()..];
    assert!(out.ends_with(y_before));
}

#[test]
fn missing_object_is_not_found() {
    let doc = Document::new(TWO_MEASURES);
    let err = locate(&doc, "measure", "DoesNotExist").unwrap_err();
    assert!(matches!(
        err,
        EditError::ObjectNotFound { ref keyword, ref name } if keyword == "measure" && name == "DoesNotExist"
    ));
    assert_eq!(doc.text(), TWO_MEASURES);
}

#[test]
fn name_must_match_exactly() {
    let doc = Document::new("\tmeasure 'Total Sales' =\n\t\t1\n");
    assert!(locate(&doc, "measure", "Total").is_err());
    assert!(locate(&doc, "measure", "total sales").is_err());
    assert!(locate(&doc, "measure", "Total Sales ").is_err());
    assert!(locate(&doc, "column", "Total Sales").is_err());
    assert!(locate(&doc, "measure", "Total Sales").is_ok());
}

#[test]
fn regex_metacharacters_in_names_are_literal() {
    let source = "\tmeasure 'Margin (%) [x].*' =\n\t\t1\n\tmeasure 'Margin' =\n\t\t2\n";
    let out = edit(source, "measure", "Margin (%) [x].*", "3");
    assert_eq!(out, "\tmeasure 'Margin (%) [x].*' =\n\t\t3\n\tmeasure 'Margin' =\n\t\t2\n");
}

#[test]
fn double_quoted_and_bare_names_are_accepted() {
    let out = edit("\tmeasure \"Q\" =\n\t\t1\n", "measure", "Q", "2");
    assert_eq!(out, "\tmeasure \"Q\" =\n\t\t2\n");

    let out = edit("\tmeasure Bare =\n\t\t1\n", "measure", "Bare", "2");
    assert_eq!(out, "\tmeasure Bare =\n\t\t2\n");
}

#[test]
fn names_with_single_quotes_are_never_found() {
    let doc = Document::new("\tmeasure 'It''s' =\n\t\t1\n");
    let err = locate(&doc, "measure", "It's").unwrap_err();
    assert_eq!(err.kind(), "ObjectNotFound");
}

#[test]
fn replacement_indentation_is_flattened() {
    let body = "\n\n  VAR a =\n    1\n\n\t\t\tRETURN\n      a\n\n";
    let out = edit("\tmeasure 'X' =\n\t\t0\n\tformatString: 0\n", "measure", "X", body);
    assert_eq!(
        out,
        "\tmeasure 'X' =\n\t\tVAR a =\n\t\t1\n\n\t\tRETURN\n\t\ta\n\tformatString: 0\n"
    );
}

#[test]
fn every_content_line_starts_at_body_depth() {
    let body = "a\n  b\n\t\tc\n\n        d";
    let out = edit("table T\n\tmeasure 'X' =\n\t\t0\n", "measure", "X", body);
    let doc = Document::new(out);
    for line in doc.lines().skip(2) {
        if line.is_empty() {
            continue;
        }
        assert!(line.starts_with("\t\t"), "line {:?}", line);
        assert!(!line[2..].starts_with(char::is_whitespace), "line {:?}", line);
    }
}

#[test]
fn relative_reindent_keeps_nesting() {
    let doc = Document::new("\tmeasure 'X' =\n\t\t0\n");
    let editor = Editor::new().with_reindent(Reindent::Relative);
    let body = "    VAR a = CALCULATE(\n        1\n    )\n    RETURN a";
    let out = editor.edit(&doc, "measure", "X", body).unwrap();
    assert_eq!(
        out.text(),
        "\tmeasure 'X' =\n\t\tVAR a = CALCULATE(\n\t\t\t1\n\t\t)\n\t\tRETURN a\n"
    );
}

#[test]
fn space_indented_documents_stay_space_indented() {
    let source = "table T\n    measure 'X' =\n        1\n    formatString: 0\n";
    let doc = Document::new(source);
    assert_eq!(doc.indent_unit(), IndentUnit::Spaces(4));

    let out = edit(source, "measure", "X", "\tVAR a = 2\n\t\tRETURN a");
    assert_eq!(
        out,
        "table T\n    measure 'X' =\n        VAR a = 2\n        RETURN a\n    formatString: 0\n"
    );
}

#[test]
fn two_space_documents_use_their_width() {
    let source = "table T\n  measure 'X' =\n    1\n";
    let out = edit(source, "measure", "X", "2");
    assert_eq!(out, "table T\n  measure 'X' =\n    2\n");
}

#[test]
fn crlf_line_endings_are_preserved() {
    let source = "\tmeasure 'X' =\r\n\t\t1\r\n\tformatString: 0\r\n";
    let out = edit(source, "measure", "X", "2\n3");
    assert_eq!(out, "\tmeasure 'X' =\r\n\t\t2\r\n\t\t3\r\n\tformatString: 0\r\n");
}

#[test]
fn object_at_end_of_document_without_newline() {
    let out = edit("\tmeasure 'X' =\n\t\t1", "measure", "X", "2");
    assert_eq!(out, "\tmeasure 'X' =\n\t\t2");

    let out = edit("\tmeasure 'X' =", "measure", "X", "2");
    assert_eq!(out, "\tmeasure 'X' =\n\t\t2");
}

#[test]
fn blank_separator_before_next_object_is_kept() {
    let source = "\tmeasure 'X' =\n\t\t1\n\n\n\tmeasure 'Y' =\n\t\t2\n";
    let out = edit(source, "measure", "X", "\n3\n\n");
    assert_eq!(out, "\tmeasure 'X' =\n\t\t3\n\n\n\tmeasure 'Y' =\n\t\t2\n");
}

#[test]
fn dedent_ends_the_object() {
    let source = "table A\n\tmeasure 'X' =\n\t\t1\ntable B\n\tcolumn C\n";
    let out = edit(source, "measure", "X", "2");
    assert_eq!(out, "table A\n\tmeasure 'X' =\n\t\t2\ntable B\n\tcolumn C\n");
}

#[test]
fn property_keywords_inside_the_body_are_not_properties() {
    // A DAX comment mentioning a property sits deeper than the declaration.
    let source = "\tmeasure 'X' =\n\t\t// formatString: keep\n\t\t1\n\tformatString: 0\n";
    let doc = Document::new(source);
    let span = locate(&doc, "measure", "X").unwrap();
    assert_eq!(span.body, 1..3);
    assert_eq!(span.properties, 3..4);
}

#[test]
fn unknown_property_keywords_stay_in_the_body() {
    let source = "\tmeasure 'X' =\n\t\t1\n\tdescription: hi\n\tformatString: 0\n";
    let doc = Document::new(source);
    let span = locate(&doc, "measure", "X").unwrap();
    assert_eq!(span.body, 1..3);
    assert_eq!(span.properties, 3..4);

    let editor = Editor::new().with_property_keywords(["description"]);
    let span = editor.locate(&doc, "measure", "X").unwrap();
    assert_eq!(span.body, 1..2);
    assert_eq!(span.properties, 2..4);
}

#[test]
fn header_and_properties_are_byte_identical() {
    let source = "\tmeasure 'X' =   \n\t\t1\n\tformatString: 0.00  \n\tannotation PBI_FormatHint = {\"isGeneral\":true}\n";
    let doc = Document::new(source);
    let before = locate(&doc, "measure", "X").unwrap();
    let edited = replace_body(&doc, &before, "2").unwrap();
    let after = locate(&edited, "measure", "X").unwrap();

    assert_eq!(before.header, after.header);
    assert_eq!(
        doc.slice(before.properties.clone()),
        edited.slice(after.properties.clone())
    );
}

#[test]
fn extracting_and_reinserting_is_identity() {
    let doc = Document::new(TWO_MEASURES);
    for name in ["X", "Y"] {
        let body = extract_body(&doc, "measure", name).unwrap();
        let out = edit_named_object(&doc, "measure", name, &body).unwrap();
        assert_eq!(out.text(), TWO_MEASURES);
    }
}

#[test]
fn relative_round_trip_keeps_nested_lines() {
    let source = "\tmeasure 'X' =\n\t\tVAR a =\n\t\t\tCALCULATE(1)\n\n\t\tRETURN a\n\tformatString: 0\n";
    let doc = Document::new(source);
    let editor = Editor::new().with_reindent(Reindent::Relative);
    let body = editor.extract(&doc, &Scope::Document, "measure", "X").unwrap();
    assert_eq!(body, "VAR a =\n\tCALCULATE(1)\n\nRETURN a");
    let out = editor.edit(&doc, "measure", "X", &body).unwrap();
    assert_eq!(out.text(), source);
}

#[test]
fn stale_span_is_rejected() {
    let doc = Document::new(TWO_MEASURES);
    let span = locate(&doc, "measure", "Y").unwrap();
    let edited = edit_named_object(&doc, "measure", "X", "1\n2\n3").unwrap();

    let err = replace_body(&edited, &span, "9").unwrap_err();
    assert!(matches!(err, EditError::StaleSpan { ref name, .. } if name == "Y"));
}

#[test]
fn span_from_other_document_is_rejected() {
    let a = Document::new("\tmeasure 'X' =\n\t\t1\n");
    let b = Document::new("\tmeasure 'X' =\n\t\t5\n");
    let span = locate(&a, "measure", "X").unwrap();
    assert_eq!(replace_body(&b, &span, "2").unwrap_err().kind(), "StaleSpan");
}

#[test]
fn headers_without_open_assignment_are_malformed() {
    let doc = Document::new("table T\n\tcolumn Amount\n\t\tdataType: double\n\tmeasure 'X' = 1 + 1\n");

    let err = locate(&doc, "column", "Amount").unwrap_err();
    assert!(matches!(err, EditError::MalformedHeader { line: 1, .. }));

    let err = locate(&doc, "measure", "X").unwrap_err();
    assert!(matches!(err, EditError::MalformedHeader { line: 3, .. }));
}

#[test]
fn partitions_with_a_source_kind_can_be_edited() {
    let source = "table Sales\n\
\tpartition 'Sales-2024' = m\n\
\t\tmode: import\n\
\t\tsource =\n\
\t\t\tlet\n\
\t\t\t\tSource = 1\n\
\t\t\tin\n\
\t\t\t\tSource\n\
\n\
\tannotation PBI_ResultType = Table\n";
    let doc = Document::new(source);
    let span = locate(&doc, "partition", "Sales-2024").unwrap();
    assert_eq!(span.body, 2..8);
    assert_eq!(span.gap(), 8..9);
    assert_eq!(span.properties, 9..10);

    let out = replace_body(&doc, &span, "mode: directQuery\nsource = x").unwrap();
    assert_eq!(
        out.text(),
        "table Sales\n\tpartition 'Sales-2024' = m\n\t\tmode: directQuery\n\t\tsource = x\n\n\tannotation PBI_ResultType = Table\n"
    );
}

#[test]
fn duplicate_names_use_first_match_and_warn() {
    let source = "table A\n\tmeasure 'M' =\n\t\t1\ntable B\n\tmeasure 'M' =\n\t\t2\n";
    let doc = Document::new(source);
    let span = locate(&doc, "measure", "M").unwrap();
    assert_eq!(span.header_line, 1);
    assert_eq!(span.shadowed, vec![4]);
    assert!(matches!(
        span.warnings().as_slice(),
        [Warning::AmbiguousName { used: 1, .. }]
    ));
}

#[test]
fn editable_duplicate_wins_over_earlier_header_without_body() {
    let source = "table A\n\tcolumn 'Amt'\n\t\tdataType: double\n\ntable B\n\tcolumn 'Amt' =\n\t\t[Qty] * [Price]\n";
    let doc = Document::new(source);

    let span = locate(&doc, "column", "Amt").unwrap();
    assert_eq!(span.header_line, 5);
    assert_eq!(span.shadowed, vec![1]);
    assert!(matches!(
        span.warnings().as_slice(),
        [Warning::AmbiguousName { used: 5, .. }]
    ));

    let out = replace_body(&doc, &span, "[Qty] * [Price] * 2").unwrap();
    assert_eq!(
        out.text(),
        "table A\n\tcolumn 'Amt'\n\t\tdataType: double\n\ntable B\n\tcolumn 'Amt' =\n\t\t[Qty] * [Price] * 2\n"
    );
}

#[test]
fn description_of_the_next_object_is_not_body() {
    let source = "\tmeasure 'X' =\n\t\t1\n\n\t/// Y description\n\tmeasure 'Y' =\n\t\t2\n";
    let out = edit(source, "measure", "X", "3");
    assert_eq!(
        out,
        "\tmeasure 'X' =\n\t\t3\n\n\t/// Y description\n\tmeasure 'Y' =\n\t\t2\n"
    );

    let doc = Document::new(source);
    let span = locate(&doc, "measure", "X").unwrap();
    assert_eq!(span.body, 1..2);
    assert_eq!(span.properties, 3..3);
}

#[test]
fn description_directly_after_the_body_is_kept() {
    let source = "table T\n\tmeasure 'X' =\n\t\t1\n\t/// about Y\n\tmeasure 'Y' =\n\t\t2\n";
    let out = edit(source, "measure", "X", "VAR a = 1\nRETURN a");
    assert_eq!(
        out,
        "table T\n\tmeasure 'X' =\n\t\tVAR a = 1\n\t\tRETURN a\n\t/// about Y\n\tmeasure 'Y' =\n\t\t2\n"
    );
}

#[test]
fn table_scope_selects_the_declaration() {
    let source = "table A\n\tmeasure 'M' =\n\t\t1\n\ntable B\n\tmeasure 'M' =\n\t\t2\n";
    let doc = Document::new(source);
    let editor = Editor::new();

    let out = editor
        .edit_in(&doc, &Scope::Table("B".into()), "measure", "M", "3")
        .unwrap();
    assert_eq!(
        out.text(),
        "table A\n\tmeasure 'M' =\n\t\t1\n\ntable B\n\tmeasure 'M' =\n\t\t3\n"
    );

    let span = editor
        .locate_in(&doc, &Scope::Table("B".into()), "measure", "M")
        .unwrap();
    assert!(span.shadowed.is_empty());

    let err = editor
        .locate_in(&doc, &Scope::Table("C".into()), "measure", "M")
        .unwrap_err();
    assert!(matches!(err, EditError::TableNotFound { ref name } if name == "C"));
}

#[test]
fn mixed_indentation_documents_are_still_edited() {
    let source = "table T\n\tmeasure 'X' =\n\t  \t1\n\tformatString: 0\n";
    let out = edit(source, "measure", "X", "2");
    assert_eq!(out, "table T\n\tmeasure 'X' =\n\t\t2\n\tformatString: 0\n");
}

#[test]
fn empty_replacement_leaves_header_and_properties() {
    let out = edit("\tmeasure 'X' =\n\t\t1\n\tformatString: 0\n", "measure", "X", "\n  \n");
    assert_eq!(out, "\tmeasure 'X' =\n\tformatString: 0\n");
}

#[test]
fn body_text_strips_one_body_level() {
    let doc = Document::new("\tmeasure 'X' =\n\t\t\tdeep\n\t\tflat\n");
    let span = locate(&doc, "measure", "X").unwrap();
    assert_eq!(body_text(&doc, &span), "\tdeep\nflat");
}
