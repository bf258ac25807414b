//! Best-effort removal of DText markup from post descriptions.
//!
//! This is a textual filter, not a parser: anything it does not recognise is
//! left in place.

use std::sync::OnceLock;

use regex::Regex;

struct Rules {
    inline: Regex,
    color_open: Regex,
    color_close: Regex,
    inline_code: Regex,
    thumb: Regex,
    block: Regex,
    header: Regex,
}

static RULES: OnceLock<Rules> = OnceLock::new();

fn rules() -> &'static Rules {
    RULES.get_or_init(|| Rules {
        inline: Regex::new(r"\[/?(?:b|i|s|u|sup|sub|spoiler)\]").expect("inline pattern"),
        color_open: Regex::new(r"\[color=[^\]]+\]").expect("color pattern"),
        color_close: Regex::new(r"\[/color\]").expect("color close pattern"),
        inline_code: Regex::new(r"`([^`]*)`").expect("inline code pattern"),
        thumb: Regex::new(r"thumb #\d+").expect("thumb pattern"),
        block: Regex::new(
            r"\[/?(?:quote|code|header|list|section|table|thead|tbody|tr|td|th)[^\]]*\]",
        )
        .expect("block pattern"),
        header: Regex::new(r"(?m)^\s*h[1-6]\.\s*").expect("header pattern"),
    })
}

pub fn strip_dtext(text: &str) -> String {
    let r = rules();
    let text = r.inline.replace_all(text, "");
    let text = r.color_open.replace_all(&text, "");
    let text = r.color_close.replace_all(&text, "");
    let text = r.inline_code.replace_all(&text, "$1");
    let text = r.thumb.replace_all(&text, "");
    let text = r.block.replace_all(&text, "");
    let text = r.header.replace_all(&text, "");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_dtext;

    #[test]
    fn removes_inline_formatting() {
        assert_eq!(
            strip_dtext("[b]bold[/b] [i]it[/i] [spoiler]x[/spoiler] [sup]1[/sup]"),
            "bold it x 1"
        );
    }

    #[test]
    fn removes_color_and_unwraps_code() {
        assert_eq!(
            strip_dtext("[color=#ff0000]red[/color] and `code`"),
            "red and code"
        );
    }

    #[test]
    fn removes_thumbs_blocks_and_headers() {
        let input = "h2. Title\n[quote]said[/quote]\nsee thumb #12345 [section=More]body[/section]";
        assert_eq!(strip_dtext(input), "Title\nsaid\nsee  body");
    }

    #[test]
    fn leaves_unknown_or_broken_markup() {
        assert_eq!(strip_dtext("[b unterminated"), "[b unterminated");
        assert_eq!(strip_dtext("[[wiki link]] \"t\":/posts/1"), "[[wiki link]] \"t\":/posts/1");
        assert_eq!(strip_dtext("`open"), "`open");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(strip_dtext("  \n plain \n"), "plain");
    }
}
