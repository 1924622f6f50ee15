//! Name tokenization and phonetic coding.

/// Lowercased tokens split on whitespace and punctuation, alphabetically
/// ordered so token order differences collapse to one comparison key.
pub fn name_tokens(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = raw
        .split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '\''))
        .map(|token| token.trim_matches('\'').to_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// American Soundex, four characters.
pub fn soundex(token: &str) -> Option<String> {
    let letters: Vec<char> = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let first = *letters.first()?;

    fn digit(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut code = String::new();
    code.push(first);
    let mut previous = digit(first);

    for &letter in &letters[1..] {
        let current = digit(letter);
        match current {
            Some(d) => {
                // H and W do not break runs of the same code; vowels do.
                if previous != Some(d) {
                    code.push(d);
                    if code.len() == 4 {
                        break;
                    }
                }
                previous = Some(d);
            }
            None => {
                if letter != 'H' && letter != 'W' {
                    previous = None;
                }
            }
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    Some(code)
}

/// Compact Metaphone-style code: consonant-group rewrites, vowels kept
/// only in initial position.
pub fn metaphone(token: &str) -> Option<String> {
    let upper: String = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if upper.is_empty() {
        return None;
    }

    let chars: Vec<char> = upper.chars().collect();
    let mut code = String::new();
    let mut i = 0;

    while i < chars.len() && code.len() < 6 {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        let emitted: Option<&str> = match (c, next) {
            ('P', Some('H')) => {
                i += 1;
                Some("F")
            }
            ('S', Some('H')) => {
                i += 1;
                Some("X")
            }
            ('C', Some('H')) => {
                i += 1;
                Some("X")
            }
            ('T', Some('H')) => {
                i += 1;
                Some("0")
            }
            ('C', Some('K')) => {
                i += 1;
                Some("K")
            }
            ('C', Some('E')) | ('C', Some('I')) | ('C', Some('Y')) => Some("S"),
            ('C', _) => Some("K"),
            ('G', Some('H')) => {
                i += 1;
                Some("K")
            }
            ('Q', _) => Some("K"),
            ('X', _) => Some("KS"),
            ('Z', _) => Some("S"),
            ('W', Some(n)) if !"AEIOU".contains(n) => None,
            ('A' | 'E' | 'I' | 'O' | 'U', _) => {
                if i == 0 {
                    Some(match c {
                        'A' => "A",
                        'E' => "E",
                        'I' => "I",
                        'O' => "O",
                        _ => "U",
                    })
                } else {
                    None
                }
            }
            ('H', _) => None,
            (other, _) => match other {
                'B' => Some("B"),
                'D' => Some("T"),
                'F' => Some("F"),
                'G' => Some("K"),
                'J' => Some("J"),
                'K' => Some("K"),
                'L' => Some("L"),
                'M' => Some("M"),
                'N' => Some("N"),
                'P' => Some("P"),
                'R' => Some("R"),
                'S' => Some("S"),
                'T' => Some("T"),
                'V' => Some("F"),
                'W' => Some("W"),
                'Y' => Some("Y"),
                _ => None,
            },
        };

        if let Some(fragment) = emitted {
            // Collapse doubled output.
            if !code.ends_with(fragment) {
                code.push_str(fragment);
            }
        }
        i += 1;
    }

    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Both phonetic codes for every token, deduplicated and sorted.
pub fn phonetic_codes(tokens: &[String]) -> Vec<String> {
    let mut codes: Vec<String> = tokens
        .iter()
        .flat_map(|token| {
            soundex(token)
                .into_iter()
                .chain(metaphone(token))
                .collect::<Vec<_>>()
        })
        .collect();
    codes.sort();
    codes.dedup();
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_order_independent() {
        assert_eq!(name_tokens("Alice Roe"), name_tokens("Roe, Alice"));
        assert_eq!(name_tokens("Alice  Roe"), vec!["alice", "roe"]);
    }

    #[test]
    fn test_soundex_known_values() {
        assert_eq!(soundex("Robert"), Some("R163".to_string()));
        assert_eq!(soundex("Rupert"), Some("R163".to_string()));
        assert_eq!(soundex("Tymczak"), Some("T522".to_string()));
        assert_eq!(soundex("Pfister"), Some("P236".to_string()));
    }

    #[test]
    fn test_soundex_matches_similar_names() {
        assert_eq!(soundex("Smith"), soundex("Smyth"));
        assert_ne!(soundex("Smith"), soundex("Jones"));
    }

    #[test]
    fn test_metaphone_rewrites() {
        assert_eq!(metaphone("Philip"), metaphone("Filip"));
        assert_eq!(metaphone("Katherine"), metaphone("Catherine"));
        assert!(metaphone("").is_none());
    }

    #[test]
    fn test_phonetic_codes_cover_all_tokens() {
        let tokens = name_tokens("Alice Roe");
        let codes = phonetic_codes(&tokens);
        assert!(codes.len() >= 2);
    }
}
