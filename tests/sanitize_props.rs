use a11y_adapt::pipeline::sanitize::REMOVED_PLACEHOLDER;
use a11y_adapt::sanitize;
use proptest::prelude::*;

/// Fragments a model might plausibly emit, hostile ones included.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z &<>]{0,12}",
        Just("<p>Plain paragraph</p>".to_string()),
        Just("<h1>Heading</h1>".to_string()),
        Just("<strong>bold</strong> and <em>italic</em>".to_string()),
        Just("<ul><li>one</li><li>two</li></ul>".to_string()),
        Just("<ol start=\"3\"><li>three</li></ol>".to_string()),
        Just("<a href=\"https://example.org\">link</a>".to_string()),
        Just("<a href=\"javascript:alert(1)\">bad link</a>".to_string()),
        Just("<p onclick=\"steal()\">handler</p>".to_string()),
        Just("<img src=\"https://example.org/x.png\" onerror=\"boom()\" alt=\"x\">".to_string()),
        Just("<script>alert('x')</script>".to_string()),
        Just("<SCRIPT src=\"https://evil.example/x.js\"></SCRIPT>".to_string()),
        Just("<style>body { display: none }</style>".to_string()),
        Just("<!-- hidden comment -->".to_string()),
        Just("<iframe src=\"https://evil.example\"></iframe>".to_string()),
        // Unbalanced and unknown markup.
        Just("<a>".to_string()),
        Just("<select>".to_string()),
        Just("<custom-box>".to_string()),
        Just("</div>".to_string()),
        Just("</p>".to_string()),
        Just("<p>".to_string()),
        Just("<li>".to_string()),
        Just("<pre>\n\nspaced</pre>".to_string()),
        Just("\n".to_string()),
        Just("\n\n  \t".to_string()),
    ]
}

fn markup() -> impl Strategy<Value = String> {
    proptest::collection::vec(fragment(), 0..10).prop_map(|parts| parts.concat())
}

/// Fragments that the filter removes entirely.
fn removed_only() -> impl Strategy<Value = String> {
    let removed = prop_oneof![
        Just("<script>alert(1)</script>"),
        Just("<style>p { color: red }</style>"),
        Just("<!-- note -->"),
    ];
    proptest::collection::vec(removed, 1..5).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn sanitizing_twice_changes_nothing(raw in markup()) {
        let once = sanitize(&raw);
        let twice = sanitize(once.as_str());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn output_has_no_executable_content(raw in markup()) {
        let safe = sanitize(&raw).into_string().to_lowercase();
        prop_assert!(!safe.contains("<script"));
        prop_assert!(!safe.contains("<style"));
        prop_assert!(!safe.contains("<iframe"));
        prop_assert!(!safe.contains("onclick="));
        prop_assert!(!safe.contains("onerror="));
        prop_assert!(!safe.contains("javascript:"));
        prop_assert!(!safe.contains("<!--"));
    }

    #[test]
    fn collapsed_input_yields_placeholder(raw in removed_only()) {
        let safe = sanitize(&raw);
        prop_assert!(safe.is_placeholder());
        prop_assert_eq!(safe.as_str(), REMOVED_PLACEHOLDER);
    }

    #[test]
    fn blank_input_stays_blank(raw in "[ \t\r\n]{0,10}") {
        let safe = sanitize(&raw);
        prop_assert_eq!(safe.as_str(), "");
    }
}
