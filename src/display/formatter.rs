//! Markdown terminal formatting using termimad

use std::io::{self, Write};
use termimad::{MadSkin, gray};

// Below this termimad wraps generated code into unreadable fragments
const MIN_WIDTH: usize = 60;

/// Write markdown to `out`, styled with termimad when `colors` is set.
pub fn write_markdown<W: Write>(out: &mut W, markdown: &str, colors: bool) -> io::Result<()> {
    if colors {
        let skin = clicod_skin();
        let (width, _) = termimad::terminal_size();
        let width = (width as usize).max(MIN_WIDTH);
        write!(out, "{}", skin.text(markdown, Some(width)))
    } else {
        writeln!(out, "{}", markdown)
    }
}

/// Skin used for all rich output
fn clicod_skin() -> MadSkin {
    use termimad::crossterm::style::{Attribute, Color::*};

    let mut skin = MadSkin::default();

    // Headers: Bold cyan/blue
    skin.headers[0].set_fg(Cyan);
    skin.headers[0].add_attr(Attribute::Bold);
    skin.headers[1].set_fg(Blue);
    skin.headers[1].add_attr(Attribute::Bold);
    skin.headers[2].set_fg(Magenta);

    // Generated code: green on dark gray
    skin.code_block.set_bg(gray(2));
    skin.code_block.set_fg(Green);

    skin.inline_code.set_fg(Yellow);
    skin.table.set_fg(White);
    skin.bold.add_attr(Attribute::Bold);
    skin.italic.add_attr(Attribute::Italic);
    skin.bullet.set_fg(Cyan);

    skin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_is_verbatim() {
        let mut out = Vec::new();
        write_markdown(&mut out, "# Title\n\n```perl\nprint 1;\n```", false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# Title\n\n```perl\nprint 1;\n```\n"
        );
    }

    #[test]
    fn test_rich_output_keeps_code_text() {
        let mut out = Vec::new();
        write_markdown(&mut out, "## Script\n\n```perl\nprint 42;\n```", true).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("print 42;"));
    }
}
