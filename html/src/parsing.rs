use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_until, take_while},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::{map, opt, recognize},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{span, trace, Level};

use super::dom::*;

lazy_static! {
    /// Elements that never have contents and need no closing tag
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

/// Elements whose contents are taken verbatim up to the matching closing tag
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("malformed markup at byte {offset} near {near:?}")]
    Malformed { offset: usize, near: String },
}

impl ParseError {
    fn at(text: &str, remaining: &str) -> Self {
        ParseError::Malformed {
            offset: text.len() - remaining.len(),
            near: remaining.chars().take(24).collect(),
        }
    }
}

/// One lexical item of markup. Elements are assembled from these by [`parse_document`].
#[derive(Debug, PartialEq)]
enum Token<'a> {
    ProcessingInstruction,
    Doctype(&'a str),
    Comment(&'a str),
    Text(&'a str),
    Open(Element, bool),
    Close(&'a str),
}

/// Parse a complete markup text into a [`Document`].
///
/// Every opened tag must be closed (void elements and `<x/>` excepted) and the whole input must
/// be consumed. Otherwise the [`ParseError`] points at the offending token; for input that ends
/// with elements still open, that is the innermost unclosed element.
///
/// Nesting is tracked with an explicit stack, so arbitrarily deep markup is accepted.
pub fn parse_document(text: &str) -> Result<Document, ParseError> {
    let span = span!(Level::TRACE, "Parsing markup", len = text.len());
    let _enter = span.enter();
    let mut document = Document::new();
    let mut open: Vec<(NodeId, &str)> = Vec::new();
    let mut input = text;
    while !input.is_empty() {
        let parent = open.last().map_or(document.root(), |&(id, _)| id);
        let (rest, token) = parse_token(input).map_err(|_| ParseError::at(text, input))?;
        input = match token {
            Token::ProcessingInstruction | Token::Doctype(_) if !open.is_empty() => {
                return Err(ParseError::at(text, input));
            }
            Token::ProcessingInstruction => rest,
            Token::Doctype(decl) => {
                document.append(parent, NodeData::Doctype(decl.to_string()));
                rest
            }
            Token::Comment(body) => {
                document.append(parent, NodeData::Comment(body.to_string()));
                rest
            }
            Token::Text(body) => {
                document.append_text(parent, body);
                rest
            }
            Token::Close(name) => match open.pop() {
                Some((id, _)) if is_named(&document, id, name) => rest,
                _ => return Err(ParseError::at(text, input)),
            },
            Token::Open(element, self_closing) => {
                let name = element.tag_name.clone();
                let id = document.append(parent, NodeData::Element(element));
                if self_closing {
                    rest
                } else if VOID_ELEMENTS.contains(name.as_str()) {
                    // Tolerate a redundant `<br></br>`
                    match parse_close_tag(rest) {
                        Ok((after, close)) if close.eq_ignore_ascii_case(&name) => after,
                        _ => rest,
                    }
                } else if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    let (close_tag, raw) =
                        parse_raw_text(rest, &name).map_err(|_| ParseError::at(text, input))?;
                    if !raw.is_empty() {
                        document.append_text(id, raw);
                    }
                    match parse_close_tag(close_tag) {
                        Ok((after, close)) if close.eq_ignore_ascii_case(&name) => after,
                        _ => return Err(ParseError::at(text, close_tag)),
                    }
                } else {
                    open.push((id, input));
                    rest
                }
            }
        };
    }
    if let Some(&(_, unclosed)) = open.last() {
        return Err(ParseError::at(text, unclosed));
    }
    trace!(nodes = document.node_count(), "Parsed document");
    Ok(document)
}

fn is_named(document: &Document, id: NodeId, name: &str) -> bool {
    document
        .element(id)
        .map_or(false, |e| e.tag_name.eq_ignore_ascii_case(name))
}

fn parse_token(input: &str) -> IResult<&str, Token> {
    alt((
        map(parse_processing_instruction, |_| Token::ProcessingInstruction),
        map(parse_doctype, Token::Doctype),
        map(parse_comment, Token::Comment),
        map(parse_close_tag, Token::Close),
        map(parse_open_tag, |(element, self_closing)| Token::Open(element, self_closing)),
        map(parse_text, Token::Text),
    ))(input)
}

/// `<?xml version="1.0"?>` and friends are accepted but not kept
fn parse_processing_instruction(input: &str) -> IResult<&str, &str> {
    delimited(tag("<?"), take_until("?>"), tag("?>"))(input)
}

fn parse_doctype(input: &str) -> IResult<&str, &str> {
    let (rest, (_, _, decl, _)) =
        tuple((tag_no_case("<!DOCTYPE"), multispace1, is_not(">"), char('>')))(input)?;
    Ok((rest, decl.trim()))
}

fn parse_comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("<!--"), take_until("-->"), tag("-->"))(input)
}

/// Attempt to parse a string as a valid tag name
fn parse_tag_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')),
    ))(input)
}

/// Parse a tag in the form `</name>`, returning `name`
fn parse_close_tag(input: &str) -> IResult<&str, &str> {
    let (remaining, (_, name, _, _)) =
        tuple((tag("</"), parse_tag_name, multispace0, char('>')))(input)?;
    Ok((remaining, name))
}

/// Parse a tag in the form `<name attr=value ...>` or `<name .../>`, returning the [`Element`]
/// and whether it closed itself
fn parse_open_tag(input: &str) -> IResult<&str, (Element, bool)> {
    let (rest, (_, name, attrs, _, slash, _)) = tuple((
        char('<'),
        parse_tag_name,
        many0(preceded(multispace1, single_attr_parser)),
        multispace0,
        opt(char('/')),
        char('>'),
    ))(input)?;
    let mut attributes = Attributes::empty();
    for (k, v) in attrs {
        attributes.insert(k.to_ascii_lowercase(), v);
    }
    Ok((
        rest,
        (
            Element::new(name.to_ascii_lowercase(), Some(attributes)),
            slash.is_some(),
        ),
    ))
}

/// Parse a run of character data up to the next tag
fn parse_text(input: &str) -> IResult<&str, &str> {
    is_not("<")(input)
}

/// Take everything up to `</name`, case-insensitively
fn parse_raw_text<'a>(input: &'a str, name: &str) -> IResult<&'a str, &'a str> {
    let closing = format!("</{}", name);
    match input.to_ascii_lowercase().find(&closing) {
        Some(end) => Ok((&input[end..], &input[..end])),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::TakeUntil))),
    }
}

#[cfg(test)]
#[test]
fn test_token_parse() {
    assert_eq!(
        parse_token("<!DOCTYPE html ><p>").unwrap(),
        ("<p>", Token::Doctype("html"))
    );
    assert_eq!(
        parse_token("<!-- a <b> -->x").unwrap(),
        ("x", Token::Comment(" a <b> "))
    );
    assert_eq!(
        parse_token("</DIV >rest").unwrap(),
        ("rest", Token::Close("DIV"))
    );
    assert_eq!(
        parse_token(r#"<?xml version="1.0"?><a/>"#).unwrap(),
        ("<a/>", Token::ProcessingInstruction)
    );
    assert_eq!(
        parse_token("Hello, world</h1>").unwrap(),
        ("</h1>", Token::Text("Hello, world"))
    );
    assert!(parse_token("<---></--->").is_err());
    assert!(parse_token("< p>").is_err());
}

#[cfg(test)]
#[test]
fn test_parse_malformed() {
    let offset = |text| match parse_document(text) {
        Err(ParseError::Malformed { offset, .. }) => Some(offset),
        Ok(_) => None,
    };
    assert_eq!(offset(r#"<html></closing><opening></html>"#), Some(6));
    assert_eq!(offset(r#"<div><span>x</div>"#), Some(12));
    assert_eq!(offset(r#"<div>"#), Some(0));
    assert_eq!(offset(r#"<p><!DOCTYPE html></p>"#), Some(3));
    assert_eq!(offset(r#"<script>x"#), Some(0));
    assert_eq!(offset(r#"<style>x</styles>"#), Some(8));
    assert_eq!(offset(r#"<p>a < b</p>"#), Some(5));
}

#[cfg(test)]
#[test]
fn test_tag_parse() {
    let target = Element::new("div", None);
    assert_eq!(parse_open_tag("<div>").unwrap(), ("", (target, false)));

    let target = Element::new("div", Some(crate::attributes!("class" => "nothing")));
    assert_eq!(
        parse_open_tag("<div class=nothing>").unwrap(),
        ("", (target, false))
    );

    let data = r#"<div attr1 attr2=two attr3='three' attr4="number four" ATTR2="dup" >"#;
    let target = Element::new(
        "div",
        Some(crate::attributes!(
            "attr1" => "",
            "attr2" => "two",
            "attr3" => "three",
            "attr4" => "number four",
        )),
    );
    assert_eq!(parse_open_tag(data).unwrap(), ("", (target, false)));

    let target = Element::new("a", Some(crate::attributes!("href" => "/x/y")));
    assert_eq!(
        parse_open_tag(r#"<a href="/x/y"/>"#).unwrap(),
        ("", (target, true))
    );
}

#[cfg(test)]
#[test]
fn test_raw_text() {
    let doc = parse_document("<script>if (a < b) { x = '</p>'; }</SCRIPT>").unwrap();
    let script = doc.children(doc.root())[0];
    let text: Vec<_> = doc.children(script).iter().map(|&c| doc.data(c)).collect();
    assert_eq!(
        text,
        [&NodeData::Text("if (a < b) { x = '</p>'; }".to_string())]
    );

    let doc = parse_document("<style></style>").unwrap();
    let style = doc.children(doc.root())[0];
    assert!(doc.children(style).is_empty());
}

#[cfg(test)]
#[test]
fn test_deep_nesting() {
    let depth = 50_000;
    let text = format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
    let doc = parse_document(&text).unwrap();
    assert_eq!(doc.node_count(), depth);

    let mismatched = format!("{}<p>{}", "<div>".repeat(depth), "</div>".repeat(depth));
    assert_eq!(
        parse_document(&mismatched).unwrap_err(),
        ParseError::Malformed {
            offset: depth * "<div>".len() + "<p>".len(),
            near: "</div></div></div></div>".to_string(),
        }
    );
}

// Attribute parsing below

fn parse_single_quoted(input: &str) -> IResult<&str, &str> {
    let (rest, value) = delimited(char('\''), opt(is_not("'")), char('\''))(input)?;
    Ok((rest, value.unwrap_or("")))
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    let (rest, value) = delimited(char('"'), opt(is_not("\"")), char('"'))(input)?;
    Ok((rest, value.unwrap_or("")))
}

fn parse_unquoted(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'=<>`")(input)
}

fn value_parser(input: &str) -> IResult<&str, &str> {
    alt((parse_single_quoted, parse_double_quoted, parse_unquoted))(input)
}

fn name_parser(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'<>/=")(input)
}

fn single_attr_parser(input: &str) -> IResult<&str, (&str, &str)> {
    let mut key_value = separated_pair(
        name_parser,
        tuple((multispace0, char('='), multispace0)),
        value_parser,
    );
    if let Ok((r, (k, v))) = key_value(input) {
        Ok((r, (k, v)))
    } else {
        let (r, res) = name_parser(input)?;
        Ok((r, (res, "")))
    }
}
