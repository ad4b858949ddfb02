//! Headline text cleanup.
//!
//! Feed titles arrive with CDATA wrappers, HTML entities, stray markup,
//! editorial prefixes ("BREAKING: ") and publisher suffixes (" - CNN").
//! [`sanitize`] turns them into a single line of printable ASCII that fits
//! the display.
//!
//! The cleanup steps run in a fixed order and are repeated until the text
//! stops changing, then the result is cropped. That makes the whole routine
//! idempotent: sanitizing already-sanitized text is a no-op.

/// Longest headline the display can show.
pub const DEFAULT_MAX_HEADLINE_LEN: usize = 114;

/// Marker appended to cropped headlines.
pub const ELLIPSIS: &str = "...";

/// A publisher suffix is only removed when its separator starts past this
/// byte offset, so short titles that happen to contain a dash survive.
const SUFFIX_MIN_OFFSET: usize = 10;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

const ENTITIES: &[(&str, &str)] = &[
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
    ("&#8217;", "'"),
    ("&#8216;", "'"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&#8220;", "\""),
    ("&#8221;", "\""),
    ("&ldquo;", "\""),
    ("&rdquo;", "\""),
    ("&#8211;", "-"),
    ("&#8212;", "-"),
    ("&ndash;", "-"),
    ("&mdash;", "-"),
    ("&#8230;", "..."),
    ("&hellip;", "..."),
    ("\u{2026}", "..."),
    ("\u{2019}", "'"),
    ("\u{2018}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{2013}", "-"),
    ("\u{2014}", "-"),
];

const INLINE_TAGS: &[&str] = &["<b>", "</b>", "<i>", "</i>", "<strong>", "</strong>", "<em>", "</em>"];

const EDITORIAL_PREFIXES: &[&str] = &[
    "LIVE: ",
    "WATCH: ",
    "VIDEO: ",
    "UPDATE: ",
    "BREAKING: ",
    "OPINION: ",
    "REVIEW: ",
];

const SUFFIX_SEPARATORS: &[&str] = &[" - ", " | "];

/// Clean `raw` into a display headline of at most `max_len` bytes.
pub fn sanitize(raw: &str, max_len: usize) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    crop(&current, max_len)
}

/// Like [`sanitize`], but first removes media blocks and every remaining
/// tag. Used for description and content fields of full-content feeds.
pub fn sanitize_markup(raw: &str, max_len: usize) -> String {
    let text = strip_cdata(raw);
    let text = strip_media(&text);
    let text = strip_tags(&text);
    sanitize(&text, max_len)
}

/// One pass of every cleanup step except cropping.
fn normalize_once(raw: &str) -> String {
    let text = strip_cdata(raw);
    let text = decode_entities(&text);
    let text = strip_inline_tags(&text);
    let text = strip_editorial_prefix(&text);
    let text = strip_source_suffix(text);
    let text = purify(text);
    collapse_whitespace(&text)
}

/// Remove literal `<![CDATA[` and `]]>` markers.
pub fn strip_cdata(raw: &str) -> String {
    raw.replace(CDATA_OPEN, "").replace(CDATA_CLOSE, "")
}

fn decode_entities(raw: &str) -> String {
    ENTITIES
        .iter()
        .fold(raw.to_string(), |text, (entity, plain)| text.replace(entity, plain))
}

fn strip_inline_tags(raw: &str) -> String {
    INLINE_TAGS
        .iter()
        .fold(raw.to_string(), |text, tag| text.replace(tag, ""))
}

fn strip_editorial_prefix(raw: &str) -> &str {
    EDITORIAL_PREFIXES.iter().fold(raw, |text, prefix| {
        match text.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
            _ => text,
        }
    })
}

fn strip_source_suffix(raw: &str) -> &str {
    SUFFIX_SEPARATORS.iter().fold(raw, |text, sep| match text.rfind(sep) {
        Some(at) if at > SUFFIX_MIN_OFFSET => &text[..at],
        _ => text,
    })
}

fn purify(raw: &str) -> String {
    raw.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect()
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Crop ASCII `text` to `max_len` bytes, breaking at the last space that
/// leaves room for the ellipsis.
fn crop(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return text[..max_len].trim_end().to_string();
    }

    let limit = max_len - ELLIPSIS.len();
    match text.as_bytes()[..=limit].iter().rposition(|&b| b == b' ') {
        Some(at) if at > 0 => format!("{}{ELLIPSIS}", &text[..at]),
        _ => format!("{}{ELLIPSIS}", &text[..limit]),
    }
}

/// Remove `<img ...>` tags and whole `<figure>...</figure>` blocks.
pub fn strip_media(html: &str) -> String {
    let mut out = html.to_string();

    while let Some(start) = out.find("<img") {
        let Some(len) = out[start..].find('>') else {
            break;
        };
        out.replace_range(start..=start + len, "");
    }

    while let Some(start) = out.find("<figure") {
        let end = match out[start..].find("</figure>") {
            Some(close) => start + close + "</figure>".len(),
            None => match out[start..].find('>') {
                Some(gt) => start + gt + 1,
                None => break,
            },
        };
        out.replace_range(start..end, "");
    }

    out
}

/// Drop everything between `<` and `>`, unconditionally.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Normalize a raw `<link>` value: CDATA markers and whitespace removed,
/// `&amp;` decoded.
pub fn clean_url(raw: &str) -> String {
    strip_cdata(raw)
        .replace("&amp;", "&")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
