//! HTML cleaning and text/title extraction (spec §4.8 step 3).

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

const STRIP_TAGS: &[&str] = &["script", "style", "nav", "header", "footer"];
const BODY_SELECTOR_CASCADE: &[&str] = &["main", "article", ".content", "#content", "body"];

fn strip_regex_for(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("static strip pattern")
}

fn strip_regexes() -> &'static [Regex] {
    static STRIP: OnceLock<Vec<Regex>> = OnceLock::new();
    STRIP.get_or_init(|| STRIP_TAGS.iter().map(|tag| strip_regex_for(tag)).collect())
}

/// Extracts a human-readable title, falling back through
/// `<title>` → first `<h1>` → `og:title` meta tag → the URL itself.
pub fn extract_title(document: &Html, url: &str) -> String {
    if let Some(title) = select_text(document, "title") {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(h1) = select_text(document, "h1") {
        let trimmed = h1.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Ok(selector) = Selector::parse(r#"meta[property="og:title"]"#) {
        if let Some(el) = document.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    url.to_string()
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| el.text().collect::<Vec<_>>().join(" "))
}

/// Extracts main body text: strips boilerplate elements, then walks a
/// selector cascade (`main`, `article`, `.content`, `#content`, `body`)
/// taking the first one present.
pub fn extract_body_text(raw_html: &str) -> String {
    let cleaned_html = strip_boilerplate(raw_html);
    let document = Html::parse_document(&cleaned_html);

    for selector_str in BODY_SELECTOR_CASCADE {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                let text = el.text().collect::<Vec<_>>().join(" ");
                let collapsed = collapse_whitespace(&text);
                if !collapsed.is_empty() {
                    return collapsed;
                }
            }
        }
    }

    String::new()
}

fn strip_boilerplate(raw_html: &str) -> String {
    let mut cleaned = raw_html.to_string();
    for pattern in strip_regexes() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts same-domain links from a parsed document, resolved against
/// `base_url`, deduplicated, capped at `limit`.
pub fn extract_links(document: &Html, base_url: &url::Url, limit: usize) -> Vec<url::Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for el in document.select(&selector) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.host_str() != base_url.host_str() {
            continue;
        }
        let normalized = normalize_url(resolved);
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    links
}

/// Strips the fragment and any `utm_*` tracking query params, so that
/// cosmetically distinct links to the same resource collapse to one
/// `source_ref` for the at-most-once ingestion check.
pub fn normalize_url(mut url: url::Url) -> url::Url {
    url.set_fragment(None);

    let retained_pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained_pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &retained_pairs {
            serializer.append_pair(key, value);
        }
        url.set_query(Some(&serializer.finish()));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_drops_fragment_and_utm_params() {
        let url = url::Url::parse("https://example.com/a?utm_source=x&keep=1#section").unwrap();
        let normalized = normalize_url(url);
        assert_eq!(normalized.as_str(), "https://example.com/a?keep=1");
    }

    #[test]
    fn normalize_url_drops_query_entirely_when_only_utm_params_present() {
        let url = url::Url::parse("https://example.com/a?utm_source=x&utm_medium=y").unwrap();
        let normalized = normalize_url(url);
        assert_eq!(normalized.as_str(), "https://example.com/a");
    }

    #[test]
    fn title_falls_back_through_cascade() {
        let doc = Html::parse_document("<html><head><title>  </title></head><body><h1>Heading</h1></body></html>");
        assert_eq!(extract_title(&doc, "https://example.com/"), "Heading");
    }

    #[test]
    fn title_falls_back_to_url_when_nothing_present() {
        let doc = Html::parse_document("<html><body><p>no title here</p></body></html>");
        assert_eq!(extract_title(&doc, "https://example.com/page"), "https://example.com/page");
    }

    #[test]
    fn body_text_prefers_main_over_body() {
        let html = "<html><body><nav>Skip me</nav><main>Real content here</main></body></html>";
        let text = extract_body_text(html);
        assert!(text.contains("Real content here"));
        assert!(!text.contains("Skip me"));
    }

    #[test]
    fn script_and_style_are_stripped() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><main>Clean text</main></body></html>";
        let text = extract_body_text(html);
        assert!(text.contains("Clean text"));
        assert!(!text.contains("evil()"));
    }

    #[test]
    fn links_are_deduped_and_capped_to_same_domain() {
        let html = r#"<html><body>
            <a href="/a">a</a>
            <a href="/a">dup</a>
            <a href="/b">b</a>
            <a href="https://other.example.com/c">c</a>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let base = url::Url::parse("https://example.com/").unwrap();
        let links = extract_links(&doc, &base, 10);

        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.host_str() == Some("example.com")));
    }
}
