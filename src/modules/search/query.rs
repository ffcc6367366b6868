// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Query-language tokenizer for the Search Service: bare words, quoted phrases, and
//! `field:term`/`field:"phrase"` pairs. Tokens combine as AND; tsquery-hostile characters are
//! stripped from bare words before they reach `to_tsquery`.

/// The four fields `field:term` can target; `cc`/`bcc` are only reachable via bare
/// words/phrases, mirroring `store::entity`'s address-column naming.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Field {
    Subject,
    Body,
    From,
    To,
}

impl Field {
    fn parse(s: &str) -> Option<Field> {
        match s.to_ascii_lowercase().as_str() {
            "subject" => Some(Field::Subject),
            "body" => Some(Field::Body),
            "from" => Some(Field::From),
            "to" => Some(Field::To),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Field::Subject => "subject",
            Field::Body => "body",
            Field::From => "from_addr",
            Field::To => "to_addr",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    /// Unquoted bare word: evaluated against all six text fields via tsquery (or its ILIKE
    /// fallback).
    Word(String),
    /// Quoted phrase, no field prefix: substring-matched against all six text fields.
    Phrase(String),
    /// `field:term` or `field:"phrase"`: substring-matched against that field only.
    FieldMatch(Field, String),
}

const TSQUERY_OPERATORS: &[char] = &['&', '|', '!', '(', ')', ':', '*'];

/// Strips tsquery operator characters from a bare word before it's joined with ` & ` and
/// evaluated as a single `to_tsquery` clause.
pub fn sanitize_bare_word(word: &str) -> String {
    word.chars().filter(|c| !TSQUERY_OPERATORS.contains(c)).collect()
}

/// Tokenizes a search input string. Unrecognized `prefix:rest` combinations (the prefix isn't
/// one of `subject`/`body`/`from`/`to`) fall through to a plain bare word, colon included.
pub fn parse(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let n = chars.len();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < n {
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= n {
            break;
        }

        if chars[i] == '"' {
            i += 1;
            let start = i;
            while i < n && chars[i] != '"' {
                i += 1;
            }
            let phrase: String = chars[start..i].iter().collect();
            if i < n {
                i += 1;
            }
            if !phrase.trim().is_empty() {
                tokens.push(Token::Phrase(phrase));
            }
            continue;
        }

        let start = i;
        while i < n && !chars[i].is_whitespace() && chars[i] != '"' {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();

        if let Some(colon) = word.find(':') {
            let (field_str, rest) = word.split_at(colon);
            let rest = &rest[1..];
            if let Some(field) = Field::parse(field_str) {
                if rest.is_empty() && i < n && chars[i] == '"' {
                    i += 1;
                    let pstart = i;
                    while i < n && chars[i] != '"' {
                        i += 1;
                    }
                    let phrase: String = chars[pstart..i].iter().collect();
                    if i < n {
                        i += 1;
                    }
                    if !phrase.trim().is_empty() {
                        tokens.push(Token::FieldMatch(field, phrase));
                    }
                    continue;
                } else if !rest.is_empty() {
                    tokens.push(Token::FieldMatch(field, rest.to_string()));
                    continue;
                }
            }
        }

        if !word.is_empty() {
            tokens.push(Token::Word(word));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_example() {
        let tokens = parse(r#"subject:"urgent" from:alice phishing"#);
        assert_eq!(
            tokens,
            vec![
                Token::FieldMatch(Field::Subject, "urgent".to_string()),
                Token::FieldMatch(Field::From, "alice".to_string()),
                Token::Word("phishing".to_string()),
            ]
        );
    }

    #[test]
    fn parses_a_bare_phrase_and_a_bare_word() {
        let tokens = parse(r#""project update" invoice"#);
        assert_eq!(
            tokens,
            vec![Token::Phrase("project update".to_string()), Token::Word("invoice".to_string())]
        );
    }

    #[test]
    fn field_term_without_quotes_is_a_field_match() {
        let tokens = parse("to:bob@example.com");
        assert_eq!(tokens, vec![Token::FieldMatch(Field::To, "bob@example.com".to_string())]);
    }

    #[test]
    fn sanitizes_tsquery_operator_characters() {
        assert_eq!(sanitize_bare_word("a&b|c!d(e)f:g*h"), "abcdefgh");
    }

    #[test]
    fn unrecognized_field_prefix_falls_back_to_a_bare_word() {
        let tokens = parse("urn:isbn:1234");
        assert_eq!(tokens, vec![Token::Word("urn:isbn:1234".to_string())]);
    }

    #[test]
    fn blank_input_yields_no_tokens() {
        assert!(parse("   ").is_empty());
    }
}
