//! GCN circular index parsing.
//!
//! The index has been published in three shapes over the years: an HTML
//! table (number, subject), a `<pre>` block of links to `.gcn3` files, and
//! the current list of `/circulars/<n>` anchors. Each layout is tried in that
//! order and the first one that yields anything wins.

use std::collections::HashSet;
use std::sync::LazyLock;

use gcnwatch_shared::BulletinReference;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

/// Parse the index page into references, newest first (page order).
/// Duplicate IDs keep their first occurrence.
pub fn parse_circular_list(html: &str, base_url: &Url) -> Vec<BulletinReference> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let doc = Html::parse_document(html);

    let (layout, refs) = [
        ("table", parse_table(&doc, base_url)),
        ("pre", parse_pre(&doc, base_url)),
        ("links", parse_links(&doc, base_url)),
    ]
    .into_iter()
    .find(|(_, refs)| !refs.is_empty())
    .unwrap_or(("none", Vec::new()));

    let refs = dedup(refs);
    if refs.is_empty() {
        warn!("no circulars found in index page");
    } else {
        info!(count = refs.len(), layout, "parsed circular index");
    }
    refs
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

fn parse_table(doc: &Html, base_url: &Url) -> Vec<BulletinReference> {
    static TABLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("table").expect("valid selector"));
    static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    static CELL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td").expect("valid selector"));
    static LINK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

    let Some(table) = doc.select(&TABLE).next() else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    for row in table.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let Some(link) = cells[0].select(&LINK).next() else {
            continue;
        };
        let text = element_text(&link);
        if !is_digits(&text) {
            continue;
        }
        let href = link.value().attr("href").unwrap_or_default();

        let id = if let Some(stem) = gcn3_stem(href) {
            if !is_digits(stem) {
                continue;
            }
            stem.to_string()
        } else if href.starts_with("/circulars/") {
            text
        } else {
            continue;
        };

        let Some(url) = circular_url(base_url, &id, href) else {
            continue;
        };
        let subject = element_text(&cells[1]);
        refs.push(BulletinReference::new(id, url, Some(subject)));
    }
    refs
}

fn parse_pre(doc: &Html, base_url: &Url) -> Vec<BulletinReference> {
    static PRE_LINK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("pre a[href]").expect("valid selector"));

    let mut refs = Vec::new();
    for link in doc.select(&PRE_LINK) {
        let href = link.value().attr("href").unwrap_or_default();
        let text = element_text(&link);
        let last_segment = href.rsplit('/').next().unwrap_or_default();

        let accepted = (gcn3_stem(href).is_some() && is_digits(&text))
            || (href.starts_with("/circulars/") && is_digits(last_segment));
        if !accepted {
            continue;
        }

        let id = if is_digits(&text) {
            text
        } else {
            last_segment.trim_end_matches(".gcn3").to_string()
        };
        if !is_digits(&id) {
            continue;
        }

        let Some(url) = circular_url(base_url, &id, href) else {
            continue;
        };

        let subject = link
            .next_sibling()
            .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Subject for {id}"));

        refs.push(BulletinReference::new(id, url, Some(subject)));
    }
    refs
}

fn parse_links(doc: &Html, base_url: &Url) -> Vec<BulletinReference> {
    static ANCHOR: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
    static CIRCULAR_PATH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^/circulars/(\d+)/?$").expect("valid regex"));

    let mut refs = Vec::new();
    for link in doc.select(&ANCHOR) {
        let href = link.value().attr("href").unwrap_or_default();
        let Ok(url) = base_url.join(href) else {
            continue;
        };
        let Some(caps) = CIRCULAR_PATH.captures(url.path()) else {
            continue;
        };
        let id = caps[1].to_string();

        let text = element_text(&link);
        let subject = (!text.is_empty() && text != id).then_some(text);
        refs.push(BulletinReference::new(id, url.to_string(), subject));
    }
    refs
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dedup(refs: Vec<BulletinReference>) -> Vec<BulletinReference> {
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

/// Page URL for a circular: `.gcn3` links map to `/circulars/<id>`, anything
/// else is resolved as given.
fn circular_url(base_url: &Url, id: &str, href: &str) -> Option<String> {
    let target = if gcn3_stem(href).is_some() {
        base_url.join(&format!("/circulars/{id}"))
    } else {
        base_url.join(href)
    };
    target.ok().map(|u| u.to_string())
}

fn gcn3_stem(href: &str) -> Option<&str> {
    href.strip_suffix(".gcn3")
        .map(|rest| rest.rsplit('/').next().unwrap_or(rest))
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
