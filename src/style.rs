//! ANSI terminal color styling for diagnostics.
//!
//! Simple ANSI escape code wrappers; all colors reset at the end of the
//! wrapped string.

pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const MAGENTA: &'static str = "\x1b[35m";

    pub fn red(s: &str) -> String {
        format!("{}{}{}", Self::RED, s, Self::RESET)
    }

    pub fn green(s: &str) -> String {
        format!("{}{}{}", Self::GREEN, s, Self::RESET)
    }

    pub fn magenta(s: &str) -> String {
        format!("{}{}{}", Self::MAGENTA, s, Self::RESET)
    }

    pub fn bold(s: &str) -> String {
        format!("{}{}{}", Self::BOLD, s, Self::RESET)
    }

    pub fn bold_red(s: &str) -> String {
        format!("{}{}{}{}", Self::BOLD, Self::RED, s, Self::RESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_wraps_string() {
        let result = Style::red("error");
        assert!(result.contains("\x1b[31m"));
        assert!(result.contains("error"));
        assert!(result.ends_with(Style::RESET));
    }

    #[test]
    fn bold_red_combines_codes() {
        let result = Style::bold_red("fatal");
        assert!(result.starts_with(Style::BOLD));
        assert!(result.contains(Style::RED));
    }
}
