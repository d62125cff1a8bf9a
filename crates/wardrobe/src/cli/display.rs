//! Display formatting utilities for CLI output

use colored::*;

use crate::server::services::similarity::Match;

/// One ranked line: position, score, and identifier
pub fn format_match(rank: usize, item: &Match) -> String {
  format!("{:>3}. {} {}", rank, format!("{:.4}", item.score).green(), item.image_path)
}

pub fn display_matches(matches: &[Match]) {
  if matches.is_empty() {
    println!("{}", "No matches found.".yellow());
    return;
  }

  println!("{} {}", "Top".bold(), format!("{} matches:", matches.len()).bold());
  for (index, item) in matches.iter().enumerate() {
    println!("{}", format_match(index + 1, item));
  }
}

pub fn display_identifiers(identifiers: &[String], dimension: usize) {
  println!(
    "{} {} entries, {} dimensions",
    "Gallery:".bold(),
    identifiers.len().to_string().cyan(),
    dimension.to_string().cyan()
  );
  for identifier in identifiers {
    println!("  {identifier}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_match_contains_rank_score_and_path() {
    colored::control::set_override(false);
    let line = format_match(2, &Match { score: 0.91234, image_path: "samples/shirt.jpg".to_string() });
    assert_eq!(line, "  2. 0.9123 samples/shirt.jpg");
  }
}
