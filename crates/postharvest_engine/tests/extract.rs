use postharvest_core::{ExtractionMode, Item, ItemKind, PageSource};
use postharvest_engine::{Extractor, HeuristicExtractor, PageSnapshot};
use pretty_assertions::assert_eq;

const CAPTURED_AT: &str = "2024-05-01T12:00:00.000Z";

fn snapshot(url: &str, html: &str) -> PageSnapshot {
    PageSnapshot {
        url: url.to_string(),
        html: html.to_string(),
        captured_at: CAPTURED_AT.to_string(),
    }
}

#[test]
fn profile_grid_tiles_carry_alt_caption_and_positional_counters() {
    let html = r#"<html><head><title>National Geographic (@natgeo)</title></head><body><main>
        <div class="tile">
          <a href="/p/AAA/"><img src="/media/a.jpg" alt="Sunset over the bay"></a>
          <ul><li><span>12.3K</span></li><li><span>45</span></li></ul>
        </div>
        <div class="tile">
          <a href="https://www.instagram.com/reel/BBB/?igsh=x"><img src="https://cdn.example.com/b.jpg" alt="A reel"></a>
        </div>
    </main></body></html>"#;

    let extraction =
        HeuristicExtractor.extract(&snapshot("https://www.instagram.com/natgeo/", html));

    let mut first = Item::bare("https://www.instagram.com/p/AAA/", "natgeo", CAPTURED_AT);
    first.caption = "Sunset over the bay".to_string();
    first.thumbnail_url = Some("https://www.instagram.com/media/a.jpg".to_string());
    first.likes = 12_300;
    first.comments = 45;
    first.page_source = PageSource::ProfileGrid;

    let mut second = Item::bare("https://www.instagram.com/reel/BBB/", "natgeo", CAPTURED_AT);
    second.caption = "A reel".to_string();
    second.thumbnail_url = Some("https://cdn.example.com/b.jpg".to_string());
    second.page_source = PageSource::ProfileGrid;

    assert_eq!(extraction.page_source, PageSource::ProfileGrid);
    assert_eq!(extraction.mode, ExtractionMode::Structured);
    assert_eq!(extraction.items, vec![first, second]);
    assert_eq!(extraction.items[1].kind, ItemKind::Reel);
}

#[test]
fn grid_tiles_sharing_a_row_keep_their_own_image() {
    let html = r#"<html><body><main>
        <div class="row">
          <a href="/p/AAA/"><img src="/media/a.jpg" alt="First caption"></a>
          <a href="/p/BBB/"><img src="/media/b.jpg" alt="Second caption"></a>
        </div>
    </main></body></html>"#;

    let extraction =
        HeuristicExtractor.extract(&snapshot("https://www.instagram.com/natgeo/", html));

    let summary: Vec<(&str, &str, Option<&str>)> = extraction
        .items
        .iter()
        .map(|item| {
            (
                item.url.as_str(),
                item.caption.as_str(),
                item.thumbnail_url.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (
                "https://www.instagram.com/p/AAA/",
                "First caption",
                Some("https://www.instagram.com/media/a.jpg"),
            ),
            (
                "https://www.instagram.com/p/BBB/",
                "Second caption",
                Some("https://www.instagram.com/media/b.jpg"),
            ),
        ]
    );
}

#[test]
fn reels_tab_reads_labelled_counters_and_views() {
    let html = r#"<html><body>
        <div class="reel">
          <a href="/reel/R1/">
            <div><video poster="/poster/r1.jpg"></video></div>
            <ul>
              <li><span aria-label="Like">1,204</span></li>
              <li><span>88</span></li>
              <li><span>25.5K</span></li>
            </ul>
          </a>
        </div>
    </body></html>"#;

    let extraction =
        HeuristicExtractor.extract(&snapshot("https://www.instagram.com/natgeo/reels/", html));

    assert_eq!(extraction.page_source, PageSource::ReelsTab);
    assert_eq!(extraction.items.len(), 1);
    let reel = &extraction.items[0];
    assert_eq!(reel.url, "https://www.instagram.com/reel/R1/");
    assert_eq!(reel.kind, ItemKind::Reel);
    assert_eq!(reel.likes, 1_204);
    assert_eq!(reel.comments, 88);
    assert_eq!(reel.views, Some(25_500));
    assert_eq!(
        reel.thumbnail_url.as_deref(),
        Some("https://www.instagram.com/poster/r1.jpg")
    );
    assert_eq!(reel.author, "natgeo");
}

#[test]
fn feed_article_uses_header_author_timestamp_and_longest_caption() {
    let html = r#"<html><body>
        <article>
          <header><a href="/traveler/"><img src="/avatar.jpg" alt="traveler's profile picture"></a></header>
          <div><img src="https://cdn.example.com/p1.jpg" alt=""></div>
          <section><span aria-label="like count">2.3K</span> <span>1,024 comments</span></section>
          <a href="/p/P1/"><time datetime="2024-03-01T10:00:00.000Z">March 1</time></a>
          <span>Morning light on the harbour</span>
        </article>
    </body></html>"#;

    let extraction = HeuristicExtractor.extract(&snapshot("https://www.instagram.com/", html));

    let mut expected = Item::bare(
        "https://www.instagram.com/p/P1/",
        "traveler",
        "2024-03-01T10:00:00.000Z",
    );
    expected.caption = "Morning light on the harbour".to_string();
    expected.thumbnail_url = Some("https://cdn.example.com/p1.jpg".to_string());
    expected.likes = 2_300;
    expected.comments = 1_024;

    assert_eq!(extraction.page_source, PageSource::Other);
    assert_eq!(extraction.mode, ExtractionMode::Structured);
    assert_eq!(extraction.items, vec![expected]);
}

#[test]
fn unstructured_links_fall_back_to_bare_items() {
    let html = r#"<html><body><p>
        <a href="/p/X1/">first</a>
        <a href="/reel/X2/?utm_source=share">second</a>
        <a href="/p/X1/#comments">again</a>
        <a href="/about/">about</a>
    </p></body></html>"#;

    let extraction =
        HeuristicExtractor.extract(&snapshot("https://www.instagram.com/explore/", html));

    assert_eq!(extraction.mode, ExtractionMode::AnchorFallback);
    assert_eq!(
        extraction.items,
        vec![
            Item::bare("https://www.instagram.com/p/X1/", "unknown", CAPTURED_AT),
            Item::bare("https://www.instagram.com/reel/X2/", "unknown", CAPTURED_AT),
        ]
    );
}

#[test]
fn page_without_posts_reports_no_match() {
    let extraction = HeuristicExtractor.extract(&snapshot(
        "https://www.instagram.com/natgeo/",
        "<html><body><p>Nothing to see</p></body></html>",
    ));

    assert_eq!(extraction.mode, ExtractionMode::NoMatch);
    assert!(extraction.items.is_empty());
}

#[test]
fn title_handle_names_the_author_when_the_path_has_none() {
    let html = r#"<html><head><title>Someone (@someone) • Instagram</title></head>
        <body><a href="/p/T1/">post</a></body></html>"#;

    let extraction =
        HeuristicExtractor.extract(&snapshot("https://www.instagram.com/p/T1/", html));

    assert_eq!(extraction.items.len(), 1);
    assert_eq!(extraction.items[0].author, "someone");
}
