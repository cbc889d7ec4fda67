use oneline_core::normalize_whitespace;
use pretty_assertions::assert_eq;

#[test]
fn collapses_spaces_tabs_and_blank_lines() {
    let raw = "\n\n  Title\t\tof page \n\n\n\tFirst   paragraph.\r\nSecond\u{2028}line  \n";
    assert_eq!(
        normalize_whitespace(raw),
        "Title of page\nFirst paragraph.\nSecond\nline"
    );
}

#[test]
fn normalized_text_is_a_fixed_point() {
    let samples = [
        "plain",
        "  leading and trailing  ",
        "a\n\n\nb\t\tc\u{a0}\u{a0}d\u{3000}e",
        "日本語\u{3000}の  本文\r\n\r\n次の段落",
        "\t",
        "",
    ];
    for raw in samples {
        let once = normalize_whitespace(raw);
        assert_eq!(normalize_whitespace(&once), once, "input {raw:?}");
        assert!(!once.contains('\t'));
        assert!(!once.contains("\n\n"));
        assert_eq!(once.trim(), once);
    }
}
