use pretty_assertions::assert_eq;

use super::lexer::{Token, tokenize};
use super::AsmErrorKind;

fn kinds(source: &str) -> Vec<Token> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

#[test]
fn test_keywords_and_punctuation() {
    assert_eq!(
        kinds("FUNC main {\n}"),
        vec![
            Token::Func,
            Token::Ident("main".into()),
            Token::LBrace,
            Token::Newline,
            Token::RBrace,
        ]
    );
}

#[test]
fn test_register_keyword_is_not_a_mnemonic_prefix() {
    assert_eq!(
        kinds("R 3\nRETURN 0, 1"),
        vec![
            Token::Registers,
            Token::Int(3),
            Token::Newline,
            Token::Ident("RETURN".into()),
            Token::Int(0),
            Token::Comma,
            Token::Int(1),
        ]
    );
}

#[test]
fn test_single_letter_keywords_beat_identifiers() {
    assert_eq!(
        kinds("R K KX RX RETURN"),
        vec![
            Token::Registers,
            Token::Const,
            Token::Ident("KX".into()),
            Token::Ident("RX".into()),
            Token::Ident("RETURN".into()),
        ]
    );
}

#[test]
fn test_literals() {
    assert_eq!(
        kinds(r#"K -12 K 2.5 K "a\tb\"c""#),
        vec![
            Token::Const,
            Token::Int(-12),
            Token::Const,
            Token::Float(2.5),
            Token::Const,
            Token::Str("a\tb\"c".into()),
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("MOVE 0, 1 ; copy\n; whole line\n"),
        vec![
            Token::Ident("MOVE".into()),
            Token::Int(0),
            Token::Comma,
            Token::Int(1),
            Token::Newline,
            Token::Newline,
        ]
    );
}

#[test]
fn test_spans() {
    let tokens = tokenize("LOADK 0, -1").unwrap();
    let spans: Vec<_> = tokens.into_iter().map(|(_, span)| span).collect();
    assert_eq!(spans, vec![0..5, 6..7, 7..8, 9..11]);
}

#[test]
fn test_invalid_input() {
    let err = tokenize("MOVE 0, @").unwrap_err();
    assert_eq!(err.kind, AsmErrorKind::InvalidToken("@".into()));
    assert_eq!(err.span, 8..9);

    let err = tokenize("K \"unterminated").unwrap_err();
    assert_eq!(err.span.start, 2);
}

#[test]
fn test_display() {
    let shown: Vec<String> = kinds("FUNC f { K 1.5 }")
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(shown, vec!["FUNC", "ident f", "{", "K", "float 1.5", "}"]);
}
