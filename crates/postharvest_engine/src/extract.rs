//! Best-effort post discovery over a rendered page.
//!
//! Markup differs per surface shape, so each shape gets its own container
//! search. Anything the containers miss is still picked up as a bare link by a
//! final sweep over post/reel anchors. Metadata is read in layers: labelled
//! icons and attributes first, free-text guesses last.
use std::collections::{HashMap, HashSet};

use chrono::DateTime;
use ego_tree::NodeId;
use postharvest_core::{
    canonical_post_url, classify_page, profile_segment, ExtractionMode, Item, ItemKind,
    PageSource, UNKNOWN_USERNAME,
};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::counter::{is_counter_text, parse_shorthand_count};
use crate::PageSnapshot;

const POST_ANCHORS: &str = r#"a[href*="/p/"], a[href*="/reel/"]"#;
const MIN_CAPTION_CHARS: usize = 10;

/// Items found on one page snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Deduplicated by url, in document order.
    pub items: Vec<Item>,
    pub page_source: PageSource,
    pub mode: ExtractionMode,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, snapshot: &PageSnapshot) -> Extraction;
}

/// Heuristic extractor for profile grids, reels tabs and post feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

impl Extractor for HeuristicExtractor {
    fn extract(&self, snapshot: &PageSnapshot) -> Extraction {
        let doc = Html::parse_document(&snapshot.html);
        let base = Url::parse(&snapshot.url).ok();
        let page_source = classify_page(&snapshot.url);
        let ctx = PageContext {
            author: page_author(base.as_ref(), &doc),
            base,
            page_source,
            captured_at: snapshot.captured_at.clone(),
        };

        let mut found = TickItems::default();
        let mut structured = false;
        for container in candidate_containers(&doc, page_source) {
            let Some(url) = post_anchor(container)
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| canonical_post_url(href, ctx.base.as_ref()))
            else {
                continue;
            };
            structured = true;
            if found.is_rich(&url) {
                continue;
            }
            let (item, rich) = ctx.build_item(url, container);
            found.offer(item, rich);
        }

        let mut swept = false;
        for anchor in select_all(doc.root_element(), POST_ANCHORS) {
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| canonical_post_url(href, ctx.base.as_ref()))
            else {
                continue;
            };
            if !found.contains(&url) {
                swept = true;
                found.offer(ctx.bare_item(url), false);
            }
        }

        let mode = if structured {
            ExtractionMode::Structured
        } else if swept {
            ExtractionMode::AnchorFallback
        } else {
            ExtractionMode::NoMatch
        };

        Extraction {
            items: found.into_items(),
            page_source,
            mode,
        }
    }
}

/// Per-tick dedupe: the first entry for a url is kept, except that a bare
/// entry gives way to a richer one found later.
#[derive(Debug, Default)]
struct TickItems {
    items: Vec<(Item, bool)>,
    index: HashMap<String, usize>,
}

impl TickItems {
    fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    fn is_rich(&self, url: &str) -> bool {
        self.index
            .get(url)
            .map(|&idx| self.items[idx].1)
            .unwrap_or(false)
    }

    fn offer(&mut self, item: Item, rich: bool) {
        match self.index.get(&item.url) {
            Some(&idx) => {
                if rich && !self.items[idx].1 {
                    self.items[idx] = (item, true);
                }
            }
            None => {
                self.index.insert(item.url.clone(), self.items.len());
                self.items.push((item, rich));
            }
        }
    }

    fn into_items(self) -> Vec<Item> {
        self.items.into_iter().map(|(item, _)| item).collect()
    }
}

struct PageContext {
    base: Option<Url>,
    author: String,
    page_source: PageSource,
    captured_at: String,
}

impl PageContext {
    fn bare_item(&self, url: String) -> Item {
        let mut item = Item::bare(url, self.author.clone(), self.captured_at.clone());
        item.page_source = self.page_source;
        item
    }

    /// Builds an item from its container; the flag tells whether any metadata
    /// beyond the link was found.
    fn build_item(&self, url: String, container: ElementRef) -> (Item, bool) {
        let mut item = self.bare_item(url);
        let scope = metadata_scope(container, self.base.as_ref());
        // A tile anchor's own image wins over anything else in its block.
        let media = if has_media(container) { container } else { scope };

        let counters = read_counters(scope, item.kind);
        item.likes = counters.likes;
        item.comments = counters.comments;
        item.views = Some(counters.views).filter(|v| item.kind == ItemKind::Reel && *v > 0);

        item.thumbnail_url = thumbnail(media, self.base.as_ref());
        item.caption = match self.page_source {
            // Grid tiles carry the caption only as the thumbnail's alt text.
            PageSource::ProfileGrid => image_alt(media).unwrap_or_default(),
            _ => caption(scope).unwrap_or_default(),
        };
        if let Some(author) = article_author(container, self.base.as_ref()) {
            item.author = author;
        }
        let timestamp = timestamp(scope);
        let rich = !item.caption.is_empty()
            || item.thumbnail_url.is_some()
            || counters.any()
            || timestamp.is_some();
        if let Some(ts) = timestamp {
            item.created_at = ts;
        }
        (item, rich)
    }
}

fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn normalized_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_is(element: ElementRef, tags: &[&str]) -> bool {
    tags.iter()
        .any(|tag| element.value().name().eq_ignore_ascii_case(tag))
}

/// Nearest ancestor with one of `tags`, not climbing past `stop`.
fn closest<'a>(element: ElementRef<'a>, tags: &[&str], stop: NodeId) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .take_while(|node| node.id() != stop)
        .filter_map(ElementRef::wrap)
        .find(|el| tag_is(*el, tags))
}

fn candidate_containers(doc: &Html, page_source: PageSource) -> Vec<ElementRef<'_>> {
    let root = doc.root_element();
    match page_source {
        PageSource::ProfileGrid => select_all(root, "a[href]")
            .into_iter()
            .filter(|a| !select_all(*a, "img").is_empty())
            .collect(),
        PageSource::ReelsTab | PageSource::Other => {
            let mut containers = select_all(root, "article");
            containers.extend(select_all(root, r#"div[role="button"] a[href]"#));
            containers.extend(
                select_all(root, "a[href]")
                    .into_iter()
                    .filter(|a| !select_all(*a, "img, video").is_empty()),
            );
            containers
        }
    }
}

fn post_anchor(container: ElementRef) -> Option<ElementRef> {
    if tag_is(container, &["a"]) {
        return Some(container);
    }
    select_all(container, POST_ANCHORS).into_iter().next()
}

/// The element metadata is read from: articles are self-contained, a tile
/// anchor borrows the nearest enclosing block that holds no other post.
fn metadata_scope<'a>(container: ElementRef<'a>, base: Option<&Url>) -> ElementRef<'a> {
    if !tag_is(container, &["a"]) {
        return container;
    }
    container
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|el| distinct_posts(*el, base) <= 1)
        .find(|el| tag_is(*el, &["div", "li", "article"]))
        .unwrap_or(container)
}

fn distinct_posts(scope: ElementRef, base: Option<&Url>) -> usize {
    select_all(scope, POST_ANCHORS)
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| canonical_post_url(href, base))
        .collect::<HashSet<_>>()
        .len()
}

fn has_media(element: ElementRef) -> bool {
    select_all(element, "img[src], video[poster]")
        .into_iter()
        .any(|media| !is_avatar(media))
}

fn page_author(base: Option<&Url>, doc: &Html) -> String {
    if let Some(segment) = base.and_then(profile_segment) {
        return segment.to_string();
    }
    select_all(doc.root_element(), "title")
        .into_iter()
        .next()
        .and_then(|title| handle_in_title(&normalized_text(title)))
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string())
}

/// Extracts `name` from titles shaped like `Display Name (@name)`.
fn handle_in_title(title: &str) -> Option<String> {
    let start = title.find("(@")? + 2;
    let len = title[start..].find(')')?;
    let handle = title[start..start + len].trim();
    (!handle.is_empty()).then(|| handle.to_string())
}

/// Author named in an article header link, e.g. `<header><a href="/name/">`.
fn article_author(container: ElementRef, base: Option<&Url>) -> Option<String> {
    if !tag_is(container, &["article"]) {
        return None;
    }
    select_all(container, "header a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match Url::parse(href) {
            Ok(url) => Some(url),
            Err(_) => base.and_then(|b| b.join(href).ok()),
        })
        .find_map(|url| {
            let segments: Vec<_> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
            match segments.as_slice() {
                [_] => profile_segment(&url).map(ToOwned::to_owned),
                _ => None,
            }
        })
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    likes: u64,
    comments: u64,
    views: u64,
}

impl Counters {
    fn any(&self) -> bool {
        self.likes > 0 || self.comments > 0 || self.views > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterLabel {
    Likes,
    Comments,
    Views,
}

fn label_from_text(text: &str) -> Option<CounterLabel> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("like") {
        Some(CounterLabel::Likes)
    } else if lower.contains("comment") {
        Some(CounterLabel::Comments)
    } else if lower.contains("view") || lower.contains("play") {
        Some(CounterLabel::Views)
    } else {
        None
    }
}

/// Label from `aria-label` attributes on the counter's group; ambiguous
/// groups (several different icons) yield nothing.
fn explicit_label(span: ElementRef, group: Option<ElementRef>) -> Option<CounterLabel> {
    if let Some(label) = span.value().attr("aria-label").and_then(label_from_text) {
        return Some(label);
    }
    let group = group?;
    if let Some(label) = group.value().attr("aria-label").and_then(label_from_text) {
        return Some(label);
    }
    let mut labels: Vec<CounterLabel> = select_all(group, "[aria-label]")
        .into_iter()
        .filter_map(|el| el.value().attr("aria-label").and_then(label_from_text))
        .collect();
    labels.dedup();
    match labels.as_slice() {
        [label] => Some(*label),
        _ => None,
    }
}

fn read_counters(scope: ElementRef, kind: ItemKind) -> Counters {
    let mut counters = Counters::default();
    for span in select_all(scope, "span") {
        let text = normalized_text(span);
        // Either a bare counter ("12.3K") or a counter with its unit ("1,024 likes").
        let (value, unit) = if is_counter_text(&text) {
            (parse_shorthand_count(&text), None)
        } else {
            match text.split_once(' ') {
                Some((number, rest)) if is_counter_text(number) => {
                    match label_from_text(rest) {
                        Some(unit) => (parse_shorthand_count(number), Some(unit)),
                        None => continue,
                    }
                }
                _ => continue,
            }
        };
        let group = closest(span, &["li", "div", "button"], scope.id());
        let position = group.map(|g| {
            g.prev_siblings()
                .filter(|node| node.value().is_element())
                .count()
        });

        let label = unit.or_else(|| explicit_label(span, group)).or(match position {
            Some(0) if value > 0 => Some(CounterLabel::Likes),
            Some(1) if value > 0 => Some(CounterLabel::Comments),
            _ if kind == ItemKind::Reel && value > 1_000 => Some(CounterLabel::Views),
            _ => None,
        });
        match label {
            Some(CounterLabel::Likes) => counters.likes = counters.likes.max(value),
            Some(CounterLabel::Comments) => counters.comments = counters.comments.max(value),
            Some(CounterLabel::Views) => counters.views = counters.views.max(value),
            None => {}
        }
    }
    counters
}

fn is_timestamp_like(text: &str) -> bool {
    text.contains("ago") || text.contains('•') || DateTime::parse_from_rfc3339(text).is_ok()
}

fn caption(scope: ElementRef) -> Option<String> {
    if let Some(h1) = select_all(scope, "h1").into_iter().next() {
        let text = normalized_text(h1);
        if !text.is_empty() {
            return Some(text);
        }
    }
    if let Some(alt) = image_alt(scope) {
        return Some(alt);
    }
    select_all(scope, "span")
        .into_iter()
        .map(normalized_text)
        .filter(|text| text.chars().count() > MIN_CAPTION_CHARS)
        .filter(|text| !is_counter_text(text) && !is_timestamp_like(text))
        .fold(None, |best: Option<String>, text| match best {
            Some(b) if b.chars().count() >= text.chars().count() => Some(b),
            _ => Some(text),
        })
}

fn is_avatar(img: ElementRef) -> bool {
    img.value()
        .attr("alt")
        .map(|alt| alt.to_ascii_lowercase().contains("profile picture"))
        .unwrap_or(false)
}

fn image_alt(scope: ElementRef) -> Option<String> {
    select_all(scope, "img[alt]")
        .into_iter()
        .filter(|img| !is_avatar(*img))
        .filter_map(|img| img.value().attr("alt"))
        .map(|alt| alt.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|alt| !alt.is_empty())
}

fn thumbnail(scope: ElementRef, base: Option<&Url>) -> Option<String> {
    let raw = select_all(scope, "img[src]")
        .into_iter()
        .filter(|img| !is_avatar(*img))
        .filter_map(|img| img.value().attr("src"))
        .chain(
            select_all(scope, "video[poster]")
                .into_iter()
                .filter_map(|video| video.value().attr("poster")),
        )
        .map(str::trim)
        .find(|src| !src.is_empty())?;
    match Url::parse(raw) {
        Ok(url) => Some(url.into()),
        Err(_) => base.and_then(|b| b.join(raw).ok()).map(Into::into),
    }
}

fn timestamp(scope: ElementRef) -> Option<String> {
    let time = select_all(scope, "time").into_iter().next()?;
    time.value()
        .attr("datetime")
        .or_else(|| time.value().attr("title"))
        .map(str::to_string)
        .or_else(|| Some(normalized_text(time)))
        .filter(|ts| !ts.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_handle_is_parsed() {
        assert_eq!(
            handle_in_title("National Geographic (@natgeo) • Photos").as_deref(),
            Some("natgeo")
        );
        assert_eq!(handle_in_title("Instagram"), None);
        assert_eq!(handle_in_title("broken (@"), None);
    }

    #[test]
    fn timestamp_detection() {
        assert!(is_timestamp_like("2 days ago"));
        assert!(is_timestamp_like("2024-03-01T10:00:00.000Z"));
        assert!(!is_timestamp_like("Sunset over the bay"));
    }
}
