//! Holder token generation

use uuid::Uuid;

/// Generate a token identifying one lock holder.
///
/// The process id keeps tokens readable when inspecting the store; the random
/// UUID makes them unique across tasks, processes and hosts.
pub fn new_token() -> String {
    format!("{}_{}", std::process::id(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_token_starts_with_pid() {
        let token = new_token();
        let pid = std::process::id().to_string();
        assert!(token.starts_with(&format!("{}_", pid)));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| new_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_tokens_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| new_token()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(all.insert(token));
            }
        }
        assert_eq!(all.len(), 800);
    }
}
