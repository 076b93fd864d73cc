//! Plain-text extraction for feed excerpts, which often arrive as HTML.

use scraper::Html;

/// Strip tags from an HTML fragment and collapse whitespace.
///
/// Plain text passes through unchanged apart from whitespace normalization.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }

    let doc = Html::parse_fragment(fragment);
    let text: Vec<&str> = doc.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
