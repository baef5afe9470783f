//! Styled terminal output utilities.

use owo_colors::OwoColorize;
use std::io::IsTerminal;

use waypoint_migrate::{ActionKind, Plan};

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a step indicator
pub fn step(current: usize, total: usize, text: &str) {
    println!("{} {}", format!("[{}/{}]", current, total).dimmed(), text);
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a numbered list item
pub fn numbered_item(number: usize, text: &str) {
    println!("  {}. {}", number.to_string().dimmed(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Print code block
pub fn code(code: &str) {
    println!();
    for line in code.lines() {
        println!("  {}", line.bright_white());
    }
    println!();
}

/// Style text as success (green)
pub fn style_success(text: &str) -> String {
    text.green().to_string()
}

/// Style text as pending (yellow)
pub fn style_pending(text: &str) -> String {
    text.yellow().to_string()
}

/// Style text as error (red)
pub fn style_error(text: &str) -> String {
    text.red().to_string()
}

/// Style an action direction
pub fn style_kind(kind: ActionKind) -> String {
    match kind {
        ActionKind::Do => style_success("do  "),
        ActionKind::Undo => style_pending("undo"),
    }
}

/// Print every action of a plan
pub fn plan(plan: &Plan) {
    section(&format!("Plan: {}", plan.summary()));
    for (i, action) in plan.iter().enumerate() {
        numbered_item(
            i + 1,
            &format!("{} {}", style_kind(action.kind), action.migration),
        );
    }
    newline();
}

/// Whether stdin is attached to a terminal
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Ask for confirmation
pub fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{} {} ", prompt, "[y/N]".dimmed());
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
