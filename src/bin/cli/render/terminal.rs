use nous_srs::flashcards::{CardStatus, QueueBucket};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap text in a color when colors are on
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Pad first, then paint, so ANSI codes don't break column widths
pub fn paint_cell(text: &str, width: usize, color: &str, use_color: bool) -> String {
    paint(&format!("{:<width$}", truncate(text, width), width = width), color, use_color)
}

pub fn status_color(status: CardStatus) -> &'static str {
    match status {
        CardStatus::New => Color::BLUE,
        CardStatus::Learning => Color::YELLOW,
        CardStatus::Review => Color::GREEN,
        CardStatus::Relearning => Color::RED,
    }
}

pub fn bucket_label(bucket: QueueBucket) -> &'static str {
    match bucket {
        QueueBucket::ExamDue => "exam due",
        QueueBucket::RegularDue => "due",
        QueueBucket::ExamNew => "exam new",
        QueueBucket::RegularNew => "new",
    }
}

/// Horizontal rule for table headers
pub fn rule(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "\u{2500}".repeat(*w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shorten to `width` characters, ending in "..." when cut
pub fn truncate(text: &str, width: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= width {
        return first_line.to_string();
    }
    if width <= 3 {
        return first_line.chars().take(width).collect();
    }
    let cut: String = first_line.chars().take(width - 3).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer question", 10), "a longe...");
        assert_eq!(truncate("line one\nline two", 20), "line one");
        assert_eq!(truncate("abcdef", 2), "ab");
    }

    #[test]
    fn test_paint_without_color() {
        assert_eq!(paint("x", Color::RED, false), "x");
        assert_eq!(paint("x", Color::RED, true), "\x1b[31mx\x1b[0m");
        assert_eq!(paint_cell("ab", 4, Color::RED, false), "ab  ");
    }

    #[test]
    fn test_rule() {
        assert_eq!(rule(&[2, 1]), "\u{2500}\u{2500} \u{2500}");
    }
}
