//! `LIKE` patterns: `%` matches any run of characters, `_` exactly one,
//! and `\` escapes the next `%`, `_` or `\`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    AnyOne,
    AnyMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pieces: Vec<Piece>,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Pattern, String> {
        let mut pieces = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let piece = match c {
                '%' => {
                    // Runs of `%` behave like a single one.
                    if pieces.last() == Some(&Piece::AnyMany) {
                        continue;
                    }
                    Piece::AnyMany
                }
                '_' => Piece::AnyOne,
                '\\' => match chars.next() {
                    Some(escaped @ ('%' | '_' | '\\')) => Piece::Char(escaped),
                    Some(other) => return Err(format!("invalid escape '\\{other}' in LIKE pattern")),
                    None => return Err("LIKE pattern ends with an escape".to_string()),
                },
                c => Piece::Char(c),
            };
            pieces.push(piece);
        }
        Ok(Pattern { pieces })
    }

    /// Greedy match that only remembers the most recent `%`, which bounds the
    /// work by `text.len() * pattern.len()`.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let pieces = &self.pieces;
        let (mut t, mut p) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match pieces.get(p) {
                Some(Piece::AnyMany) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(Piece::AnyOne) => {
                    t += 1;
                    p += 1;
                }
                Some(Piece::Char(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                _ => match backtrack {
                    Some((star, consumed)) => {
                        p = star + 1;
                        t = consumed + 1;
                        backtrack = Some((star, consumed + 1));
                    }
                    None => return false,
                },
            }
        }
        pieces[p..].iter().all(|piece| *piece == Piece::AnyMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn like(text: &str, pattern: &str) -> bool {
        Pattern::compile(pattern).unwrap().matches(text)
    }

    #[test]
    fn wildcards() {
        assert!(like("foo_bar", r"foo\_%"));
        assert!(!like("fooXbar", r"foo\_%"));
        assert!(like("abc", "a_c"));
        assert!(!like("ac", "a_c"));
        assert!(like("", "%"));
        assert!(!like("", "_"));
        assert!(like("mississippi", "%iss%ppi"));
        assert!(!like("mississippi", "%iss%ppx"));
        assert!(like("100%", r"100\%"));
        assert!(!like("1000", r"100\%"));
        assert!(like(r"a\b", r"a\\b"));
    }

    #[test]
    fn bad_escapes_are_rejected() {
        assert!(Pattern::compile(r"a\").is_err());
        assert!(Pattern::compile(r"\x").is_err());
    }

    #[test]
    fn works_on_characters_not_bytes() {
        assert!(like("héllo", "h_llo"));
        assert!(like("日本語", "%本%"));
    }

    proptest! {
        #[test]
        fn percent_matches_everything(text in ".*") {
            prop_assert!(like(&text, "%"));
        }

        #[test]
        fn escaped_text_matches_itself(text in "[a-z%_\\\\]{0,12}") {
            let escaped: String = text
                .chars()
                .flat_map(|c| match c {
                    '%' | '_' | '\\' => vec!['\\', c],
                    c => vec![c],
                })
                .collect();
            prop_assert!(like(&text, &escaped));
            let longer = format!("{text}x");
            prop_assert!(!like(&longer, &escaped));
        }

        #[test]
        fn prefix_pattern_matches_extensions(prefix in "[a-z]{0,6}", rest in "[a-z]{0,6}") {
            let text = format!("{prefix}{rest}");
            let pattern = format!("{prefix}%");
            prop_assert!(like(&text, &pattern));
        }
    }
}
