//! Field extraction from a captured `<item>` fragment.

use tracing::trace;

/// Return the text between the first `open` marker and the next `close`
/// marker after it.
///
/// A missing or out-of-order marker yields an empty string: feeds routinely
/// omit fields such as `<pubDate>`, and the caller decides what an empty
/// value means.
pub fn extract_value<'a>(fragment: &'a str, open: &str, close: &str) -> &'a str {
    let Some(start) = fragment.find(open).map(|at| at + open.len()) else {
        trace!(tag = open, "tag missing");
        return "";
    };
    match fragment[start..].find(close) {
        Some(len) => &fragment[start..start + len],
        None => {
            trace!(tag = close, "closing tag missing");
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = "<title>Hello</title><link>https://example.com/a</link><pubDate></pubDate>";

    #[test]
    fn extracts_between_markers() {
        assert_eq!(extract_value(ITEM, "<title>", "</title>"), "Hello");
        assert_eq!(extract_value(ITEM, "<link>", "</link>"), "https://example.com/a");
    }

    #[test]
    fn missing_open_tag_is_empty() {
        assert_eq!(extract_value(ITEM, "<description>", "</description>"), "");
    }

    #[test]
    fn missing_close_tag_is_empty() {
        assert_eq!(extract_value("<title>Dangling", "<title>", "</title>"), "");
    }

    #[test]
    fn close_before_open_is_empty() {
        assert_eq!(extract_value("</title>x<title>y", "<title>", "</title>"), "");
    }

    #[test]
    fn empty_element_is_empty() {
        assert_eq!(extract_value(ITEM, "<pubDate>", "</pubDate>"), "");
    }

    #[test]
    fn first_occurrence_wins() {
        let xml = "<title>One</title><title>Two</title>";
        assert_eq!(extract_value(xml, "<title>", "</title>"), "One");
    }
}
