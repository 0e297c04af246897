//! Operator confirmation on the terminal

use async_trait::async_trait;
use cairn_agent::{ConfirmationRequest, Confirmer};

use crate::utils;

/// Asks on stdin; only "y" or "yes" approves
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        let prompt = format!("\nAllow {}? [y/N]: ", request);
        match utils::ask_line(prompt).await {
            Some(answer) => is_approval(&answer),
            None => {
                tracing::debug!("No answer on stdin, denying {}", request);
                false
            }
        }
    }
}

/// Whether an operator answer approves the request
pub fn is_approval(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_approval() {
        assert!(is_approval("y"));
        assert!(is_approval(" YES \n"));
        assert!(!is_approval(""));
        assert!(!is_approval("n"));
        assert!(!is_approval("yeah"));
    }
}
