use pastealt_client::format::{preview_text, render_item, time_ago};
use pastealt_core::ClipboardItem;

const MINUTE_MS: u64 = 60_000;

#[test]
fn relative_ages_round_down() {
    let now = 10 * 24 * 60 * MINUTE_MS;
    assert_eq!(time_ago(now - 59_999, now), "just now");
    assert_eq!(time_ago(now - 5 * MINUTE_MS, now), "5m ago");
    assert_eq!(time_ago(now - 90 * MINUTE_MS, now), "1h ago");
    assert_eq!(time_ago(now - 3 * 24 * 60 * MINUTE_MS, now), "3d ago");
}

#[test]
fn future_timestamps_read_as_just_now() {
    assert_eq!(time_ago(2_000, 1_000), "just now");
}

#[test]
fn long_previews_end_with_an_ellipsis() {
    assert_eq!(preview_text("abcdef", 3), "abc…");
    assert_eq!(preview_text("abc", 3), "abc");
    assert_eq!(preview_text("héllo wörld", 5), "héllo…");
}

#[test]
fn rendered_line_shows_pin_kind_age_and_preview() {
    let mut item = ClipboardItem::from_text("https://example.com".to_owned(), None, 0);
    item.pinned = true;
    let line = render_item(&item, 2 * 60 * MINUTE_MS);

    assert!(line.starts_with(&item.id[..8]));
    assert!(line.contains(" * link "));
    assert!(line.contains("2h ago"));
    assert!(line.ends_with("https://example.com"));
}
