//! Quote-aware tokenizer for check specifications

/// Split `line` on spaces and tabs, keeping quoted text together.
///
/// Text between matching `'` or `"` quotes forms one token with the quotes
/// removed. Quotes only open a token at its start: inside an unquoted word a
/// `'` is kept as text and a `"` ends the word. An opening quote without a
/// partner is dropped and the rest is scanned as unquoted text. An empty
/// quoted pair yields no token.
pub fn tokenize(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if is_separator(c) {
            i += 1;
            continue;
        }

        if is_quote(c) {
            match chars[i + 1..].iter().position(|&ch| ch == c) {
                Some(len) => {
                    if len > 0 {
                        tokens.push(chars[i + 1..i + 1 + len].iter().collect());
                    }
                    i += len + 2;
                }
                None => i += 1,
            }
            continue;
        }

        let start = i;
        while i < chars.len() && !is_separator(chars[i]) && chars[i] != '"' {
            i += 1;
        }
        tokens.push(chars[start..i].iter().collect());
    }

    tokens
}

/// Strip one pair of matching surrounding quotes, if present.
pub fn remove_quotes(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}
