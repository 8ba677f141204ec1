//! Finding links in event text and rewriting them to short numbered forms.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// A bare URL in the comment text.
    Url,
    /// An `<img>` in an HTML comment.
    Image,
    /// An `<a>` whose visible text is not the URL itself.
    Anchor { text: String },
}

/// A reference extracted from a case. `index` is scoped to the case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: usize,
    pub url: String,
    pub kind: LinkKind,
}

/// A bare URL found in plain text, by byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub start: usize,
    pub end: usize,
    pub url: String,
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s\[\]{}()<>,"]+"#).expect("valid url regex")
    })
}

fn img_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid img regex")
    })
}

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a\s*>"#)
            .expect("valid anchor regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

/// Scans plain text for URLs.
pub fn find_urls(text: &str) -> Vec<UrlMatch> {
    url_regex()
        .find_iter(text)
        .map(|m| UrlMatch {
            start: m.start(),
            end: m.end(),
            url: m.as_str().to_string(),
        })
        .collect()
}

/// Absolute `<img>` sources, in document order.
pub fn find_images(html: &str) -> Vec<String> {
    img_regex()
        .captures_iter(html)
        .map(|c| unescape_html(&c[1]))
        .filter(|src| is_absolute(src))
        .collect()
}

/// `(href, text)` of anchors whose text differs from the href.
pub fn find_anchors(html: &str) -> Vec<(String, String)> {
    anchor_regex()
        .captures_iter(html)
        .filter_map(|c| {
            let href = unescape_html(&c[1]);
            let text = unescape_html(tag_regex().replace_all(&c[2], "").trim());
            (!text.is_empty() && text != href).then_some((href, text))
        })
        .collect()
}

pub fn is_absolute(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Rewrites `text` for display.
///
/// `urls` are replaced by byte range with `marker(index)`. `anchors` are
/// `(text, index)` pairs: the first occurrence of each text after the
/// previous anchor gets the marker appended. Anchors are applied in the
/// order given, after all URLs.
pub fn rewrite(
    text: &str,
    urls: &[(UrlMatch, usize)],
    anchors: &[(String, usize)],
    marker: impl Fn(usize) -> String,
) -> String {
    let mut out = text.to_string();
    // Back to front so earlier offsets stay valid.
    let mut ordered: Vec<_> = urls.iter().collect();
    ordered.sort_by_key(|(m, _)| std::cmp::Reverse(m.start));
    for (m, index) in ordered {
        if out.is_char_boundary(m.start) && out.is_char_boundary(m.end) && m.end <= out.len() {
            out.replace_range(m.start..m.end, &marker(*index));
        }
    }

    let mut cursor = 0;
    for (anchor_text, index) in anchors {
        if let Some(pos) = out[cursor..].find(anchor_text.as_str()) {
            let end = cursor + pos + anchor_text.len();
            let inserted = format!(" {}", marker(*index));
            out.insert_str(end, &inserted);
            cursor = end + inserted.len();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls_stops_at_delimiters() {
        let text = "see http://a.com/x?y=1, and (https://b.org/p) or {ftp://c.net}";
        let urls: Vec<_> = find_urls(text).into_iter().map(|m| m.url).collect();
        assert_eq!(urls, vec!["http://a.com/x?y=1", "https://b.org/p", "ftp://c.net"]);
    }

    #[test]
    fn test_find_images_keeps_absolute_only() {
        let html = r#"<p><img src="https://x.com/a.png"><img alt="" src='default.asp?pg=1'></p>"#;
        assert_eq!(find_images(html), vec!["https://x.com/a.png"]);
    }

    #[test]
    fn test_find_anchors_skips_self_labelled() {
        let html = r#"<a href="http://a.com">http://a.com</a> and <a class="x" href="http://b.com/?a=1&amp;b=2"><b>the docs</b></a>"#;
        assert_eq!(
            find_anchors(html),
            vec![("http://b.com/?a=1&b=2".to_string(), "the docs".to_string())]
        );
    }

    #[test]
    fn test_rewrite_urls_and_anchors() {
        let text = "go to http://a.com then read the docs, the docs again";
        let urls = find_urls(text);
        let urls: Vec<_> = urls.into_iter().map(|m| (m, 1)).collect();
        let anchors = vec![("the docs".to_string(), 2), ("the docs".to_string(), 3)];
        let out = rewrite(text, &urls, &anchors, |i| format!("[{i}]"));
        assert_eq!(out, "go to [1] then read the docs [2], the docs [3] again");
    }

    #[test]
    fn test_rewrite_handles_multibyte_text() {
        let text = "ünïcode http://x.io/é done";
        let urls: Vec<_> = find_urls(text).into_iter().map(|m| (m, 4)).collect();
        assert_eq!(rewrite(text, &urls, &[], |i| format!("<{i}>")), "ünïcode <4> done");
    }
}
