use super::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Integer(i32),
    String(String),
    Boolean(bool),
    Identifier(String),
    And,
    Or,
    Xor,
    Not,
    Like,
    Exists,
    In,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LeftParen,
    RightParen,
    Comma,
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, Error> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let token = match c {
            '\'' | '"' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, c2)) = chars.next() {
                    if c2 == '\\' {
                        if let Some(&(_, quoted)) = chars.peek() {
                            if quoted == c {
                                literal.push(quoted);
                                chars.next();
                                continue;
                            }
                        }
                        literal.push(c2);
                    } else if c2 == c {
                        closed = true;
                        break;
                    } else {
                        literal.push(c2);
                    }
                }
                if !closed {
                    return Err(Error::parse(position, "unterminated string literal"));
                }
                Token::String(literal)
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                let value = digits
                    .parse::<i32>()
                    .map_err(|_| Error::parse(position, format!("integer literal {digits} out of range")))?;
                Token::Integer(value)
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&(_, w)) = chars.peek() {
                    if !(w.is_ascii_alphanumeric() || w == '_') {
                        break;
                    }
                    word.push(w);
                    chars.next();
                }
                keyword(&word).unwrap_or(Token::Identifier(word))
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let (token, two_chars) = match (c, next) {
                    ('!', Some('=')) => (Token::NotEqual, true),
                    ('<', Some('>')) => (Token::NotEqual, true),
                    ('<', Some('=')) => (Token::LessOrEqual, true),
                    ('>', Some('=')) => (Token::GreaterOrEqual, true),
                    ('<', _) => (Token::Less, false),
                    ('>', _) => (Token::Greater, false),
                    ('=', _) => (Token::Equal, false),
                    ('+', _) => (Token::Plus, false),
                    ('-', _) => (Token::Minus, false),
                    ('*', _) => (Token::Star, false),
                    ('/', _) => (Token::Slash, false),
                    ('%', _) => (Token::Percent, false),
                    ('(', _) => (Token::LeftParen, false),
                    (')', _) => (Token::RightParen, false),
                    (',', _) => (Token::Comma, false),
                    _ => return Err(Error::parse(position, format!("unexpected character '{c}'"))),
                };
                if two_chars {
                    chars.next();
                }
                tokens.push(Spanned { token, position });
                continue;
            }
        };
        tokens.push(Spanned { token, position });
    }
    Ok(tokens)
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "XOR" => Token::Xor,
        "NOT" => Token::Not,
        "LIKE" => Token::Like,
        "EXISTS" => Token::Exists,
        "IN" => Token::In,
        "TRUE" => Token::Boolean(true),
        "FALSE" => Token::Boolean(false),
        _ => return None,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            tokens("a and B Or not TRUE"),
            vec![
                Token::Identifier("a".into()),
                Token::And,
                Token::Identifier("B".into()),
                Token::Or,
                Token::Not,
                Token::Boolean(true),
            ]
        );
    }

    #[test]
    fn string_escapes_only_touch_the_quote() {
        assert_eq!(tokens(r"'foo\_%'"), vec![Token::String(r"foo\_%".into())]);
        assert_eq!(tokens(r#"'it\'s' "say \"hi\"""#), vec![
            Token::String("it's".into()),
            Token::String("say \"hi\"".into()),
        ]);
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("1<>2 != <= >= < > = + - * / % ( ) ,"),
            vec![
                Token::Integer(1),
                Token::NotEqual,
                Token::Integer(2),
                Token::NotEqual,
                Token::LessOrEqual,
                Token::GreaterOrEqual,
                Token::Less,
                Token::Greater,
                Token::Equal,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::LeftParen,
                Token::RightParen,
                Token::Comma,
            ]
        );
    }

    #[test]
    fn errors_carry_position() {
        match tokenize("a = 'open") {
            Err(Error::Parse { position, .. }) => assert_eq!(position, 4),
            other => panic!("unexpected {other:?}"),
        }
        assert!(tokenize("a # b").is_err());
        assert!(tokenize("99999999999").is_err());
    }
}
