use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const TAB_CELLS: usize = 4;
const ELLIPSIS: char = '\u{2026}';

/// Terminal cells needed to print `s`. Tabs take four cells.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

/// Cut `s` to at most `max_cells` cells, ending with `…` when something
/// was dropped. Never splits a grapheme cluster.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 0 {
        return String::new();
    }

    let budget = max_cells - 1;
    let mut used = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let w = grapheme_width(g);
        if used + w > budget {
            break;
        }
        used += w;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

fn grapheme_width(g: &str) -> usize {
    if g == "\t" {
        TAB_CELLS
    } else {
        UnicodeWidthStr::width(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_of_mixed_scripts() {
        assert_eq!(display_width("milk"), 4);
        assert_eq!(display_width("牛奶"), 4);
        assert_eq!(display_width("🥛 milk"), 7);
        assert_eq!(display_width("cafe\u{0301}"), 4);
        assert_eq!(display_width("a\tb"), 6);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_to_width("Buy milk", 8), "Buy milk");
    }

    #[test]
    fn long_text_gets_ellipsis() {
        assert_eq!(truncate_to_width("Buy milk and eggs", 9), "Buy milk…");
    }

    #[test]
    fn wide_characters_are_not_split() {
        // budget of 4 fits two CJK cells, the third would overflow
        let out = truncate_to_width("买牛奶和鸡蛋", 5);
        assert_eq!(out, "买牛…");
        assert!(display_width(&out) <= 5);
    }

    #[test]
    fn zero_width_budget() {
        assert_eq!(truncate_to_width("anything", 0), "");
        assert_eq!(truncate_to_width("anything", 1), "…");
    }
}
