//! Discovery of the stylesheet class that paints text pure red.
//!
//! Document generators emit opaque class names (`c2`, `c7`, ...) so the class
//! marking the correct option is different in every upload.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// A single-class rule whose declaration block sets `color` to `#ff0000`.
///
/// The selector must open the stylesheet or follow the previous rule's `}`,
/// so compound and descendant selectors (`p .c2`, `li.c5`) never match. The
/// optional `[^}]*;` group lets `color` appear after other declarations
/// while keeping `background-color` and friends from matching.
static RED_RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\})\s*\.([\w-]+)\s*\{(?:[^}]*;)?\s*color\s*:\s*#ff0000\s*(?:;|\})")
        .expect("valid regex")
});

/// Return the first class, in document order, declared red by an inline `<style>` block.
pub fn find_red_class(doc: &Html) -> Option<String> {
    let style_sel = Selector::parse("style").expect("valid selector");

    doc.select(&style_sel).find_map(|style| {
        let css: String = style.text().collect();
        find_red_class_in_css(&css)
    })
}

/// Scan raw stylesheet text for the first red class rule.
pub fn find_red_class_in_css(css: &str) -> Option<String> {
    RED_RULE_RE
        .captures(css)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_red_over_green() {
        let css = ".a{color:#FF0000}.b{color:#00ff00}";
        assert_eq!(find_red_class_in_css(css).as_deref(), Some("a"));
    }

    #[test]
    fn first_match_wins() {
        let css = ".c9{color:#00ff00} .c2 { font-weight: 700; color: #ff0000; } .c4{color:#ff0000}";
        assert_eq!(find_red_class_in_css(css).as_deref(), Some("c2"));
    }

    #[test]
    fn ignores_background_color() {
        let css = ".c5{background-color:#ff0000}.c6{border-color:#FF0000;}";
        assert_eq!(find_red_class_in_css(css), None);
    }

    #[test]
    fn trailing_semicolon_is_optional() {
        assert_eq!(
            find_red_class_in_css(".x1{color:#ff0000;}").as_deref(),
            Some("x1")
        );
        assert_eq!(
            find_red_class_in_css(".x1{font-size:11pt;color:#Ff0000}").as_deref(),
            Some("x1")
        );
    }

    #[test]
    fn rejects_other_reds() {
        assert_eq!(find_red_class_in_css(".a{color:#ff0001}"), None);
        assert_eq!(find_red_class_in_css(".a{color:red}"), None);
    }

    #[test]
    fn rejects_compound_and_descendant_selectors() {
        for css in [
            "p .c2{color:#ff0000}",
            ".c1.c2{color:#ff0000}",
            "li.c5{color:#ff0000}",
            ".c1>.c2{color:#ff0000}",
        ] {
            assert_eq!(find_red_class_in_css(css), None, "{css}");
        }
    }

    #[test]
    fn single_class_rule_after_compound_rule() {
        let css = "ol.lst-kix_a{margin:0}p .c3{color:#ff0000} .c7{color:#ff0000}";
        assert_eq!(find_red_class_in_css(css).as_deref(), Some("c7"));
    }

    #[test]
    fn style_blocks_are_scanned_in_order() {
        let html = r#"<html><head>
            <style>.c1{color:#000000}</style>
            <style>.c8{color:#ff0000}</style>
            <style>.c2{color:#ff0000}</style>
        </head><body></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(find_red_class(&doc).as_deref(), Some("c8"));
    }

    #[test]
    fn missing_style_is_not_an_error() {
        let doc = Html::parse_document("<html><body><p class=\"c1\">1. Q</p></body></html>");
        assert_eq!(find_red_class(&doc), None);
    }
}
