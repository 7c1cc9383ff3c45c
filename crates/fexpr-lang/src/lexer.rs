pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::bytes::complete::take_till;
use nom::combinator::opt;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of},
    combinator::{map, map_res, recognize, value},
    multi::many0,
    sequence::{delimited, pair},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

#[derive(Debug, Default)]
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Self
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        match tokens(Span::new(input)) {
            Ok((span, tokens)) => {
                let (rest, _) = multispace0::<Span, nom::error::Error<Span>>(span)
                    .unwrap_or((span, span));

                match rest.fragment().chars().next() {
                    None => {
                        let eof: Position = rest.into();
                        Ok([
                            tokens,
                            vec![Token {
                                range: Range::new(eof.clone(), eof),
                                kind: TokenKind::Eof,
                            }],
                        ]
                        .concat())
                    }
                    Some(c) => Err(lexer_error(rest, c)),
                }
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let c = e.input.fragment().chars().next().unwrap_or(' ');
                Err(lexer_error(e.input, c))
            }
            Err(nom::Err::Incomplete(_)) => Err(LexerError::UnexpectedCharacter(
                Range::default(),
                ' ',
            )),
        }
    }
}

fn lexer_error(rest: Span, c: char) -> LexerError {
    let start: Position = rest.into();
    let range = Range::new(
        start.clone(),
        Position::new(start.line, start.column + 1),
    );

    match c {
        '{' => LexerError::UnterminatedField(range),
        '\'' | '"' => LexerError::UnterminatedString(range),
        c => LexerError::UnexpectedCharacter(range, c),
    }
}

define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(eq, "=", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lt_gt, "<>", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(empty_single_quoted, "''", TokenKind::StringLiteral(String::new()));
define_token_parser!(empty_double_quoted, "\"\"", TokenKind::StringLiteral(String::new()));

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((l_paren, r_paren, comma, dot)).parse(input)
}

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        eq_eq, ne_eq, lt_gt, lte, gte, eq, lt, gt, plus, minus, asterisk, slash, percent,
    ))
    .parse(input)
}

fn field(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, name) = delimited(char('{'), take_till(|c| c == '}'), char('}')).parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::Field(SmolStr::new(name.fragment().trim())),
        },
    ))
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |span: Span| {
            str::parse::<f64>(span.fragment()).map(|n| Token {
                range: span.into(),
                kind: TokenKind::NumberLiteral(Number::new(n)),
            })
        },
    )
    .parse(input)
}

fn quoted_string(input: Span, quote: char) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let normal = if quote == '\'' { "'\\" } else { "\"\\" };
    let (span, s) = delimited(
        char(quote),
        escaped_transform(
            none_of(normal),
            '\\',
            alt((
                value('\\', char('\\')),
                value('\'', char('\'')),
                value('\"', char('\"')),
                value('\r', char('r')),
                value('\n', char('n')),
                value('\t', char('t')),
            )),
        ),
        char(quote),
    )
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s.to_string()),
        },
    ))
}

fn single_quoted(input: Span) -> IResult<Span, Token> {
    quoted_string(input, '\'')
}

fn double_quoted(input: Span) -> IResult<Span, Token> {
    quoted_string(input, '"')
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((
        number_literal,
        empty_single_quoted,
        empty_double_quoted,
        single_quoted,
        double_quoted,
    ))
    .parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |span: Span| {
            let kind = match span.fragment().to_ascii_lowercase().as_str() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "like" => TokenKind::Like,
                "true" => TokenKind::BoolLiteral(true),
                "false" => TokenKind::BoolLiteral(false),
                "null" => TokenKind::Null,
                _ => TokenKind::Ident(SmolStr::new(span.fragment())),
            };

            Token {
                range: span.into(),
                kind,
            }
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((field, literals, operators, punctuations, ident)).parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    many0(delimited(multispace0, token, multispace0)).parse(input)
}
