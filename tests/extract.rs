use benchkit::extract::{extract_final, parse_branches};

#[test]
fn final_marker_returns_trimmed_remainder_in_any_case() {
    assert_eq!(extract_final("Work...\nFINAL: 42  "), "42");
    assert_eq!(extract_final("reasoning\nfinal:   Paris\nextra line"), "Paris");
    assert_eq!(extract_final("Final: B) blue"), "B) blue");
}

#[test]
fn first_final_marker_wins() {
    assert_eq!(extract_final("FINAL: 3\nwait, no\nFINAL: 4"), "3");
}

#[test]
fn marker_with_nothing_after_it_is_empty() {
    assert_eq!(extract_final("steps\nFINAL:"), "");
    assert_eq!(extract_final("FINAL:\nnot on marker line"), "");
    assert_eq!(extract_final("FINAL:   \t\n42"), "");
}

#[test]
fn missing_marker_falls_back_to_full_last_line() {
    assert_eq!(extract_final("step one\nthe answer is 17\n\n  "), "the answer is 17");
    assert_eq!(extract_final("  single line  "), "single line");
}

#[test]
fn empty_input_yields_empty_string() {
    assert_eq!(extract_final(""), "");
    assert_eq!(extract_final("\n \n\t"), "");
}

#[test]
fn branches_keep_lines_within_token_range_in_order() {
    let text = "- First add the two numbers\nok\n• Then divide the total by two\n- Finally report the result clearly";
    let branches = parse_branches(text, 5);
    assert_eq!(
        branches,
        vec![
            "First add the two numbers",
            "Then divide the total by two",
            "Finally report the result clearly",
        ]
    );
}

#[test]
fn branches_are_capped() {
    let text = "one two three\nfour five six\nseven eight nine\nten eleven twelve";
    assert_eq!(parse_branches(text, 2), vec!["one two three", "four five six"]);
}

#[test]
fn overlong_lines_are_discarded() {
    let long = vec!["word"; 41].join(" ");
    let text = format!("{long}\nshort but valid line");
    assert_eq!(parse_branches(&text, 3), vec!["short but valid line"]);
}

#[test]
fn no_surviving_line_falls_back_to_first_non_empty_line() {
    assert_eq!(parse_branches("\n  - yes\nno way", 3), vec!["yes"]);
}

#[test]
fn bullet_only_lines_fall_back_to_first_raw_line() {
    assert_eq!(parse_branches("-\n•\n- -", 3), vec!["-"]);
    assert_eq!(parse_branches("\n  • \n-", 2), vec!["•"]);
}

#[test]
fn whitespace_only_text_falls_back_to_empty_candidate() {
    assert_eq!(parse_branches("   ", 3), vec![String::new()]);
}

#[test]
fn branches_never_exceed_cap_and_never_empty() {
    let samples = [
        "",
        "x",
        "a b c\nd e f\ng h i\nj k l",
        "-\n•\n- -",
        "one two three four",
    ];
    for text in samples {
        for max in 1..=4 {
            let branches = parse_branches(text, max);
            assert!(!branches.is_empty(), "empty for {text:?}");
            assert!(branches.len() <= max, "too many for {text:?}");
        }
    }
}

#[test]
fn zero_cap_is_treated_as_one() {
    assert_eq!(parse_branches("a b c\nd e f", 0).len(), 1);
}
