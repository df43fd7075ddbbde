//! Shared CLI output helpers for consistent terminal output.
//!
//! Color scheme (respects NO_COLOR):
//! - Green: success, checkmarks
//! - Red: errors
//! - Yellow: warnings
//! - Cyan: profiles, paths, hints
//! - Bold: headers, important values
//! - Dimmed: secondary info
//!
//! Diagnostics (errors, warnings, hints) go to stderr so that stdout stays
//! clean for data and for the output of `keyswitch run`.

use std::fmt::Display;

use console::style;

const RULE_WIDTH: usize = 56;

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Print a success message with checkmark (green).
///
/// Example: `✓ switched to work`
pub fn success(msg: &str) {
    if colors_enabled() {
        println!("{} {}", style("✓").green(), msg);
    } else {
        println!("✓ {}", msg);
    }
}

/// Print an error message to stderr (red).
pub fn error(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("✗").red(), msg);
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// Print a warning to stderr (yellow).
pub fn warn(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("⚠").yellow(), msg);
    } else {
        eprintln!("⚠ {}", msg);
    }
}

/// Print a hint to stderr (cyan).
///
/// Example: `→ run: keyswitch init`
pub fn hint(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("→").cyan(), style(msg).cyan());
    } else {
        eprintln!("→ {}", msg);
    }
}

/// Print a bold header.
pub fn header(title: &str) {
    if colors_enabled() {
        println!("{}", style(title).bold());
    } else {
        println!("{}", title);
    }
}

/// Print a key-value pair (label dimmed, value bold).
///
/// Example: `  email:    me@work.example`
pub fn kv(label: &str, value: impl Display) {
    if colors_enabled() {
        println!("  {:<10}  {}", style(label).dim(), style(value).bold());
    } else {
        println!("  {:<10}  {}", label, value);
    }
}

/// Print a list item with bullet.
pub fn list_item(item: &str) {
    println!("  • {}", item);
}

/// Print a horizontal rule.
pub fn rule() {
    let line = "─".repeat(RULE_WIDTH);
    if colors_enabled() {
        println!("{}", style(line).dim());
    } else {
        println!("{}", line);
    }
}

/// Print a dimmed/secondary message.
pub fn dimmed(msg: &str) {
    if colors_enabled() {
        println!("{}", style(msg).dim());
    } else {
        println!("{}", msg);
    }
}

/// Print a header followed by a rule, after a blank line.
pub fn section(title: &str) {
    blank();
    header(title);
    rule();
}

/// Print raw data, uncolored.
pub fn data(text: &str) {
    println!("{}", text);
}

pub fn blank() {
    println!();
}

/// Format a profile slug in cyan.
pub fn profile(slug: &str) -> String {
    if colors_enabled() {
        style(slug).cyan().to_string()
    } else {
        slug.to_string()
    }
}

/// Format a path in cyan.
pub fn path(p: impl Display) -> String {
    if colors_enabled() {
        style(p).cyan().to_string()
    } else {
        p.to_string()
    }
}

/// Format a count in bold green.
pub fn count(n: usize) -> String {
    if colors_enabled() {
        style(n).green().bold().to_string()
    } else {
        n.to_string()
    }
}
