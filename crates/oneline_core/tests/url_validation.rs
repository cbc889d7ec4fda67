use oneline_core::{validate_url, UrlRejection, MAX_URL_CHARS};

#[test]
fn accepts_http_and_https() {
    for raw in ["http://example.com", "https://example.com/article?id=1#top"] {
        let url = validate_url(raw).expect("valid url");
        assert!(url.as_str().starts_with("http"));
    }
}

#[test]
fn rejection_reasons_follow_check_order() {
    let cases = [
        ("", UrlRejection::Empty),
        ("   ", UrlRejection::Empty),
        ("example.com/article", UrlRejection::Malformed),
        ("https://", UrlRejection::Malformed),
        ("ftp://example.com/x", UrlRejection::UnsupportedScheme),
        ("javascript:alert(1)", UrlRejection::UnsupportedScheme),
        ("file:///etc/passwd", UrlRejection::UnsupportedScheme),
    ];
    for (raw, expected) in cases {
        assert_eq!(validate_url(raw), Err(expected), "input {raw:?}");
    }
}

#[test]
fn length_limit_is_inclusive() {
    let prefix = "https://example.com/";
    let at_limit = format!("{prefix}{}", "a".repeat(MAX_URL_CHARS - prefix.len()));
    assert!(validate_url(&at_limit).is_ok());

    let over_limit = format!("{at_limit}a");
    assert_eq!(validate_url(&over_limit), Err(UrlRejection::TooLong));
}

#[test]
fn rejection_messages_are_user_readable() {
    assert_eq!(UrlRejection::Empty.to_string(), "URL required");
    assert_eq!(UrlRejection::TooLong.to_string(), "URL too long");
    assert_eq!(UrlRejection::Malformed.to_string(), "malformed URL");
    assert_eq!(UrlRejection::UnsupportedScheme.to_string(), "unsupported scheme");
}
