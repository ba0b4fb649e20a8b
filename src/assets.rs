//! Bundled stylesheet and script injected into rewritten pages.

pub const FONTS_CSS: &str = include_str!("../assets/css/fonts.css");
pub const BASE_CSS: &str = include_str!("../assets/css/base.css");
pub const TABLES_CSS: &str = include_str!("../assets/css/tables.css");

/// Frameset helper script, injected only into frameset shells.
pub const INJECTED_JS: &str = include_str!("../assets/js/injected.js");

pub fn combined_css() -> String {
    [FONTS_CSS, BASE_CSS, TABLES_CSS].join("\n\n")
}
