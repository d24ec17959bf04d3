use colored::Colorize;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::apply::ApplySummary;
use crate::wire::{CodeBundle, DesignConcept};

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn show_concepts(concepts: &[DesignConcept]) {
    println!("\n=== CONCEPTS ===");
    if concepts.is_empty() {
        println!("(no concepts)");
        return;
    }
    for (i, c) in concepts.iter().enumerate() {
        println!("{}. {}  {}", i + 1, c.name.bold(), format!("[{}]", c.theme).cyan());
        println!("   {}", c.description);
        if !c.color_palette.is_empty() {
            println!("   palette: {}", c.color_palette.join(" ").yellow());
        }
        println!("   type: {}  layout: {}", c.typography, c.layout_analysis);
        if c.html_preview.contains("<img") {
            println!("   {}", "preview ready".green());
        } else {
            println!("   {}", "preview unavailable".red());
        }
    }
    println!();
}

pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    let _ = io::stdout().flush();
    let mut s = String::new();
    if io::stdin().read_line(&mut s).is_ok() {
        let ans = s.trim().to_lowercase();
        ans == "y" || ans == "yes"
    } else {
        false
    }
}

/// Ask for a 1-based index until one is valid; `None` on EOF or `q`.
pub fn pick(count: usize) -> Option<usize> {
    loop {
        print!("Pick a concept [1-{count}] (q to quit): ");
        let _ = io::stdout().flush();
        let mut s = String::new();
        match io::stdin().read_line(&mut s) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let ans = s.trim();
        if ans.eq_ignore_ascii_case("q") {
            return None;
        }
        match parse_pick(ans, count) {
            Some(i) => return Some(i),
            None => println!("{}", "not a valid choice".red()),
        }
    }
}

/// 1-based text -> 0-based index.
pub fn parse_pick(ans: &str, count: usize) -> Option<usize> {
    ans.parse::<usize>().ok().filter(|n| (1..=count).contains(n)).map(|n| n - 1)
}

pub fn print_bundle(bundle: &CodeBundle) {
    println!(
        "\n{}",
        "┏━━━━━━━━━━━━━━━━━━━━━━━━ Bundle ━━━━━━━━━━━━━━━━━━━━━━━━━┓".bold()
    );
    for (path, body) in bundle.files() {
        println!("  {}  {}", path.green(), format_size(body.len(), DECIMAL));
    }
    println!(
        "  {}: {}   {}: {}",
        "Files".bold(), bundle.len(),
        "Size".bold(), format_size(bundle.total_bytes(), DECIMAL)
    );
    println!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());
}

pub fn print_apply_dashboard(sum: &ApplySummary) {
    println!(
        "  {}: {}   {}: {}   {}: {}",
        "Created".green().bold(), sum.created,
        "Updated".yellow().bold(), sum.updated,
        "Bytes".bold(), format_size(sum.bytes, DECIMAL)
    );
    for p in &sum.written {
        println!("  {}", p.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_is_one_based_and_bounded() {
        assert_eq!(parse_pick("1", 4), Some(0));
        assert_eq!(parse_pick("4", 4), Some(3));
        assert_eq!(parse_pick("0", 4), None);
        assert_eq!(parse_pick("5", 4), None);
        assert_eq!(parse_pick("two", 4), None);
    }
}
