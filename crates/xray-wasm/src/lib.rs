use std::sync::LazyLock;

use wasm_bindgen::prelude::*;
use xray_detect::WatchPage;

static WATCH_PAGE: LazyLock<WatchPage> = LazyLock::new(WatchPage::default);

/// Parse a raw player title into its JSON form.
#[wasm_bindgen]
pub fn parse_title(input: &str) -> String {
    let parsed = xray_parse::parse(input);
    serde_json::to_string(&parsed).unwrap_or_else(|_| "{}".to_string())
}

/// Whether `url` is a watch page under the default patterns.
#[wasm_bindgen]
pub fn is_watch_url(url: &str) -> bool {
    WATCH_PAGE.is_watch_url(url)
}
