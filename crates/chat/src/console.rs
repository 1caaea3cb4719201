//! Interactive prompts on stdin/stdout for the retrieval fallback and the
//! document query offer

use crate::session::QueryConfirmer;
use reportrag_common::db::models::RetrievedRow;
use reportrag_search::{FallbackChoice, FallbackDecider};
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Reads answers from stdin
pub struct ConsolePrompts;

impl ConsolePrompts {
    fn ask(&self, question: &str) -> String {
        print!("{}", question);
        if let Err(e) = io::stdout().flush() {
            warn!(error = %e, "Failed to flush stdout");
        }

        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            warn!(error = %e, "Failed to read answer");
        }
        line.trim().to_string()
    }
}

impl FallbackDecider for ConsolePrompts {
    fn decide(&self, best: &RetrievedRow, threshold: f64) -> FallbackChoice {
        println!("No chunks meet threshold {}.", threshold);
        println!(
            "   Highest available similarity = {:.4}, from doc_id={}",
            best.similarity, best.id
        );
        let answer =
            self.ask("Do you want to use this chunk? (y/n) or specify a new minimum cosine value: ");
        parse_fallback_answer(&answer)
    }
}

impl QueryConfirmer for ConsolePrompts {
    fn confirm_query(&self, offer: &str) -> Option<String> {
        println!("{}", offer);
        let choice = self.ask("Please type 'y' to run the query, or 'n' to continue chit-chat: ");
        if !choice.eq_ignore_ascii_case("y") {
            return None;
        }
        let query = self.ask("Please type the query you want me to run: ");
        (!query.is_empty()).then_some(query)
    }
}

/// `y` accepts the best row, a number is a new threshold, anything else
/// rejects
pub fn parse_fallback_answer(answer: &str) -> FallbackChoice {
    let answer = answer.trim().to_lowercase();
    if answer == "y" {
        return FallbackChoice::Accept;
    }
    match answer.parse::<f64>() {
        Ok(threshold) if threshold.is_finite() => FallbackChoice::NewThreshold(threshold),
        _ => FallbackChoice::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fallback_answer() {
        assert_eq!(parse_fallback_answer(" Y "), FallbackChoice::Accept);
        assert_eq!(parse_fallback_answer("0.35"), FallbackChoice::NewThreshold(0.35));
        assert_eq!(parse_fallback_answer("n"), FallbackChoice::Reject);
        assert_eq!(parse_fallback_answer(""), FallbackChoice::Reject);
        assert_eq!(parse_fallback_answer("nan"), FallbackChoice::Reject);
    }
}
