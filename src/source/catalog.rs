//! Built-in source list used when the config file names no `[[sources]]`.

use super::{Palette, Palette::*, Source, SourceStyle};

fn src(name: &str, url: &str, text: Palette, background: Palette, title: Palette, full: bool) -> Source {
    Source::new(name, url, SourceStyle { text, background, title }).full_content(full)
}

/// The default thirty feeds, in batch order.
pub fn builtin_sources() -> Vec<Source> {
    vec![
        // batch A
        // Regional outlets marked age-exempt: their aggregator feeds surface
        // older articles.
        src("VALDOSTA DAILY", "https://news.google.com/rss/search?q=site:valdostadailytimes.com", Black, Gold, Black, false).age_exempt(true),
        src("THOMASVILLE T-E", "https://news.google.com/rss/search?q=site:timesenterprise.com", White, Red, Black, false).age_exempt(true),
        src("MOULTRIE OBS", "https://news.google.com/rss/search?q=site:moultrieobserver.com", White, Maroon, White, false).age_exempt(true),
        src("TALLY REPORTS", "https://tallahasseereports.com/feed/", White, Maroon, White, true),
        src("BAINBRIDGE POST", "https://thepostsearchlight.com/feed/", White, Purple, Gold, true),
        src("WAKULLA SUN", "https://thewakullasun.com/feed/", White, Red, White, true).age_exempt(true),
        // batch B
        src("GREENE PUB", "https://www.greenepublishing.com/feed/", White, DarkGreen, White, true),
        src("APALACH TIMES", "https://news.google.com/rss/search?q=site:apalachicolatimes.com", White, Blue, Cyan, false),
        src("SUWANNEE DEM", "https://news.google.com/rss/search?q=site:suwanneedemocrat.com", White, Blue, White, false),
        src("HAVANA HERALD", "https://theherald.online/feed/", Black, White, Black, true),
        src("WJHG NEWS 7", "https://news.google.com/rss/search?q=site:wjhg.com", White, Red, Blue, false),
        src("CNN", "https://news.google.com/rss/search?q=site:cnn.com", Black, White, Red, false),
        // batch C
        src("USA TODAY", "https://news.google.com/rss/search?q=site:usatoday.com", White, Navy, Cyan, false),
        src("NBC NEWS", "https://news.google.com/rss/search?q=site:nbcnews.com", White, Violet, White, false),
        src("ABC NEWS", "https://news.google.com/rss/search?q=site:abcnews.go.com", White, Black, White, false),
        src("NY POST", "https://news.google.com/rss/search?q=site:nypost.com", White, Red, White, false),
        src("CHRISTIAN SCI", "https://news.google.com/rss/search?q=site:csmonitor.com", White, Charcoal, Yellow, false),
        src("DAILY WIRE", "https://news.google.com/rss/search?q=site:dailywire.com", White, Blue, White, false),
        // batch D
        src("NEWSWEEK", "https://news.google.com/rss/search?q=site:newsweek.com", White, Red, White, false),
        src("REUTERS", "https://news.google.com/rss/search?q=site:reuters.com", Orange, Charcoal, White, false),
        src("ASSOC. PRESS", "https://news.google.com/rss/search?q=site:apnews.com", Black, Gold, Black, false),
        src("FLA POLITICS", "https://floridapolitics.com/feed/", White, Orange, Navy, true),
        src("HUFFPOST", "https://news.google.com/rss/search?q=site:huffpost.com", White, Teal, White, false),
        src("FOX NEWS", "https://news.google.com/rss/search?q=site:foxnews.com", White, DarkRed, Yellow, false),
        // batch E
        src("WSJ", "https://news.google.com/rss/search?q=site:wsj.com", Black, White, Black, false),
        src("FORBES", "https://news.google.com/rss/search?q=site:forbes.com", White, DarkBlue, Gold, false),
        src("REASON", "https://news.google.com/rss/search?q=site:reason.com", Black, Orange, Black, false),
        src("SKY NEWS", "https://news.google.com/rss/search?q=site:news.sky.com", White, Red, White, false),
        src("BBC NEWS", "https://news.google.com/rss/search?q=site:bbc.com", White, DarkRed, White, false),
        src("POLITICO", "https://news.google.com/rss/search?q=site:politico.com", White, Blue, Red, false),
    ]
}
