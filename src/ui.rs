use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// ── Terminal helpers ──────────────────────────────────────────────────────────

fn term_width() -> usize {
    Term::stdout().size().1.max(60) as usize
}

fn rule() -> String {
    "─".repeat(term_width().min(52))
}

// ── Banner ────────────────────────────────────────────────────────────────────

pub fn print_banner() {
    let _ = Term::stdout().clear_screen();

    let logo = [
        r"     _             _       ____                 _     _",
        r"    / \   _ __ ___| |__   |  _ \ _ __ _____   _(_)___(_) ___  _ __",
        r"   / _ \ | '__/ __| '_ \  | |_) | '__/ _ \ \ / / / __| |/ _ \| '_ \",
        r"  / ___ \| | | (__| | | | |  __/| | | (_) \ V /| \__ \ | (_) | | | |",
        r" /_/   \_\_|  \___|_| |_| |_|   |_|  \___/ \_/ |_|___/_|\___/|_| |_|",
    ];

    println!();
    for line in &logo {
        println!("{}", style(line).cyan().bold());
    }
    println!();
    println!(
        "{}",
        style(format!("   Bare-metal provisioning  ·  v{}", env!("CARGO_PKG_VERSION")))
            .dim()
            .italic()
    );
    println!();
    println!("{}", style(rule()).dim());
    println!();
}

// ── Step header ───────────────────────────────────────────────────────────────

/// Prints a visually distinct numbered step header.
pub fn print_step(step: u8, total: u8, title: &str) {
    println!();
    let tag = style(format!(" {}/{} ", step, total)).black().on_cyan().bold();
    let heading = style(format!("  {}", title)).white().bold();
    println!("{}{}", tag, heading);
    println!("{}", style(rule()).dim());
}

// ── Feedback messages ─────────────────────────────────────────────────────────

/// Green ✓ — operation completed successfully.
pub fn print_success(msg: &str) {
    println!("  {}  {}", style("✓").green().bold(), style(msg).green());
}

/// Blue → — neutral info / progress note.
pub fn print_info(msg: &str) {
    println!("  {}  {}", style("→").blue().bold(), msg);
}

/// Magenta ◌ — a step that was only described.
pub fn print_dry_run(msg: &str) {
    println!(
        "  {}  {} {}",
        style("◌").magenta().bold(),
        style("[dry run]").magenta(),
        msg
    );
}

/// Yellow ⚠  — non-fatal notice.
pub fn print_warning(msg: &str) {
    println!("  {}  {}", style("⚠").yellow().bold(), style(msg).yellow());
}

/// Red ✗ — error (written to stderr).
pub fn print_error(msg: &str) {
    eprintln!("  {}  {}", style("✗").red().bold(), style(msg).red());
}

/// Lists the rules an input broke, under a red heading.
pub fn print_rejection(heading: &str, reasons: &[&str]) {
    print_error(heading);
    for reason in reasons {
        println!("     {} {}", style("-").dim(), reason);
    }
}

// ── Info box ──────────────────────────────────────────────────────────────────

/// Renders a bordered key→value box in the terminal.
///
/// ```text
/// ┌─ Mount Plan ──────────────────────┐
/// │  /dev/sda2   /target              │
/// │  /dev/sda1   /target/boot/efi     │
/// └───────────────────────────────────┘
/// ```
pub fn print_kv_box(title: &str, rows: &[(&str, &str)]) {
    const BOX_INNER: usize = 38;

    let dashes = "─".repeat(BOX_INNER.saturating_sub(title.chars().count() + 2));
    println!(
        "  ┌─ {} {}┐",
        style(title).white().bold(),
        style(&dashes).dim()
    );

    for (key, val) in rows {
        println!(
            "  │  {:<13}{}",
            style(*key).dim(),
            style(*val).white().bold()
        );
    }

    println!("  └{}┘", style("─".repeat(BOX_INNER + 2)).dim());
}

// ── Spinner ───────────────────────────────────────────────────────────────────

/// Returns a running braille spinner. Call `pb.finish_and_clear()` when done.
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("  {spinner:.cyan.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
