//! Move-list transcript tokenizer.

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Split a turn-numbered transcript ("1. f3 e5 2. g4 Qh4# 0-1") into its SAN
/// tokens. Move numbers, result tokens and `{...}` comments are dropped;
/// numbers glued to a move ("1.e4") are split off.
pub fn tokenize_move_list(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut cleaned = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }

    for raw in cleaned.split_whitespace() {
        if RESULT_TOKENS.contains(&raw) {
            continue;
        }
        let digits_stripped = raw.trim_start_matches(|c: char| c.is_ascii_digit());
        let token = if digits_stripped.len() < raw.len() && digits_stripped.starts_with('.') {
            digits_stripped.trim_start_matches('.')
        } else {
            raw
        };
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }

    tokens
}
