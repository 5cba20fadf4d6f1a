use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while};
use nom::character::complete::{char, digit0, digit1, multispace0, satisfy};
use nom::combinator::{map, map_opt, map_res, not, opt, recognize, success, value, verify};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use super::{ArithmeticOp, Axis, CompareOp, Expr, LocationPath, NodeTest, SelectorError, Step};

/// Names that introduce a node test rather than a function call
const NODE_TYPES: [&str; 3] = ["text", "node", "comment"];

/// Parse and validate a complete selector
pub(crate) fn selector(text: &str) -> Result<Expr, SelectorError> {
    let expr = match delimited(multispace0, parse_or, multispace0)(text) {
        Ok(("", expr)) => expr,
        Ok((rest, _)) => {
            return Err(SelectorError::Syntax {
                offset: text.len() - rest.len(),
            })
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(SelectorError::Syntax {
                offset: text.len() - e.input.len(),
            })
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(SelectorError::Syntax { offset: text.len() })
        }
    };
    validate(&expr)?;
    Ok(expr)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn parse_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))(input)
}

/// An operator word such as `and`, not followed by further name characters
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

fn fold_binary<T>(first: Expr, rest: Vec<(T, Expr)>, build: impl Fn(Expr, T, Expr) -> Expr) -> Expr {
    rest.into_iter()
        .fold(first, |left, (op, right)| build(left, op, right))
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (r, (first, rest)) = pair(parse_and, many0(pair(ws(keyword("or")), parse_and)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, _, r| Expr::Or(l.into(), r.into())),
    ))
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (r, (first, rest)) =
        pair(parse_equality, many0(pair(ws(keyword("and")), parse_equality)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, _, r| Expr::And(l.into(), r.into())),
    ))
}

fn parse_equality(input: &str) -> IResult<&str, Expr> {
    let op = alt((
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Eq, char('=')),
    ));
    let (r, (first, rest)) = pair(parse_relational, many0(pair(ws(op), parse_relational)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, op, r| Expr::Compare(l.into(), op, r.into())),
    ))
}

fn parse_relational(input: &str) -> IResult<&str, Expr> {
    let op = alt((
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, char('<')),
        value(CompareOp::Gt, char('>')),
    ));
    let (r, (first, rest)) = pair(parse_additive, many0(pair(ws(op), parse_additive)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, op, r| Expr::Compare(l.into(), op, r.into())),
    ))
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let op = alt((
        value(ArithmeticOp::Add, char('+')),
        value(ArithmeticOp::Sub, char('-')),
    ));
    let (r, (first, rest)) = pair(parse_unary, many0(pair(ws(op), parse_unary)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, op, r| Expr::Arithmetic(l.into(), op, r.into())),
    ))
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    let (r, (signs, expr)) = pair(many0(ws(char('-'))), parse_union)(input)?;
    Ok((
        r,
        signs
            .into_iter()
            .fold(expr, |e, _| Expr::Negate(Box::new(e))),
    ))
}

fn parse_union(input: &str) -> IResult<&str, Expr> {
    let (r, (first, rest)) = pair(parse_path_expr, many0(pair(ws(char('|')), parse_path_expr)))(input)?;
    Ok((
        r,
        fold_binary(first, rest, |l, _, r| Expr::Union(l.into(), r.into())),
    ))
}

fn parse_path_expr(input: &str) -> IResult<&str, Expr> {
    alt((parse_filter_path, parse_location_path))(input)
}

/// A primary expression with optional predicates and trailing steps
fn parse_filter_path(input: &str) -> IResult<&str, Expr> {
    let (r, (primary, predicates, tail)) = tuple((
        parse_primary,
        many0(parse_predicate),
        opt(pair(parse_separator, parse_relative_steps)),
    ))(input)?;
    if predicates.is_empty() && tail.is_none() {
        return Ok((r, primary));
    }
    let steps = tail
        .map(|(mut steps, rest)| {
            steps.extend(rest);
            steps
        })
        .unwrap_or_default();
    Ok((
        r,
        Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        },
    ))
}

fn descendant_or_self() -> Step {
    Step::new(Axis::DescendantOrSelf, NodeTest::Node)
}

fn parse_location_path(input: &str) -> IResult<&str, Expr> {
    let path = alt((
        map(preceded(tag("//"), parse_relative_steps), |steps| {
            let mut all = vec![descendant_or_self()];
            all.extend(steps);
            (true, all)
        }),
        map(preceded(char('/'), opt(parse_relative_steps)), |steps| {
            (true, steps.unwrap_or_default())
        }),
        map(parse_relative_steps, |steps| (false, steps)),
    ));
    map(path, |(absolute, steps)| {
        Expr::Path(LocationPath { absolute, steps })
    })(input)
}

/// `/` adds nothing, `//` stands for `/descendant-or-self::node()/`
fn parse_separator(input: &str) -> IResult<&str, Vec<Step>> {
    ws(alt((
        map(tag("//"), |_| vec![descendant_or_self()]),
        map(char('/'), |_| vec![]),
    )))(input)
}

fn parse_relative_steps(input: &str) -> IResult<&str, Vec<Step>> {
    let (r, (first, rest)) = pair(parse_step, many0(pair(parse_separator, parse_step)))(input)?;
    let mut steps = vec![first];
    for (separator, step) in rest {
        steps.extend(separator);
        steps.push(step);
    }
    Ok((r, steps))
}

fn parse_step(input: &str) -> IResult<&str, Step> {
    alt((
        value(Step::new(Axis::Parent, NodeTest::Node), tag("..")),
        value(Step::new(Axis::SelfAxis, NodeTest::Node), char('.')),
        parse_axis_step,
    ))(input)
}

fn parse_axis_step(input: &str) -> IResult<&str, Step> {
    let (r, (axis, test, predicates)) =
        tuple((parse_axis, parse_node_test, many0(parse_predicate)))(input)?;
    Ok((
        r,
        Step {
            axis,
            test,
            predicates,
        },
    ))
}

fn parse_axis(input: &str) -> IResult<&str, Axis> {
    let named = map_opt(terminated(parse_name, ws(tag("::"))), |name| {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    });
    alt((
        value(Axis::Attribute, ws(char('@'))),
        named,
        success(Axis::Child),
    ))(input)
}

fn parse_node_type<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    value((), tuple((tag(name), ws(char('(')), char(')'))))
}

fn parse_node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        value(NodeTest::Text, parse_node_type("text")),
        value(NodeTest::Node, parse_node_type("node")),
        value(NodeTest::Comment, parse_node_type("comment")),
        value(NodeTest::Any, char('*')),
        map(parse_name, |name| NodeTest::Name(name.to_ascii_lowercase())),
    ))(input)
}

fn parse_predicate(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('[')), parse_or, ws(char(']')))(input)
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    alt((
        parse_literal,
        parse_number,
        parse_function_call,
        delimited(ws(char('(')), parse_or, ws(char(')'))),
    ))(input)
}

fn parse_literal(input: &str) -> IResult<&str, Expr> {
    let (r, text) = alt((
        delimited(char('"'), opt(is_not("\"")), char('"')),
        delimited(char('\''), opt(is_not("'")), char('\'')),
    ))(input)?;
    Ok((r, Expr::Literal(text.unwrap_or("").to_string())))
}

fn parse_number(input: &str) -> IResult<&str, Expr> {
    let digits = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ));
    map(map_res(digits, str::parse::<f64>), Expr::Number)(input)
}

fn parse_function_call(input: &str) -> IResult<&str, Expr> {
    let (r, (name, _, args, _)) = tuple((
        verify(parse_name, |name: &str| !NODE_TYPES.contains(&name)),
        ws(char('(')),
        separated_list0(ws(char(',')), parse_or),
        ws(char(')')),
    ))(input)?;
    Ok((r, Expr::Function(name.to_string(), args)))
}

/// Accepted argument counts per function, as (min, max)
fn arity(name: &str) -> Option<(usize, Option<usize>)> {
    Some(match name {
        "last" | "position" | "true" | "false" => (0, Some(0)),
        "count" | "not" | "boolean" => (1, Some(1)),
        "name" | "local-name" | "string" | "normalize-space" | "string-length" | "number" => {
            (0, Some(1))
        }
        "contains" | "starts-with" | "ends-with" => (2, Some(2)),
        "concat" => (2, None),
        _ => return None,
    })
}

fn validate_step(step: &Step) -> Result<(), SelectorError> {
    step.predicates.iter().try_for_each(validate)
}

/// Reject calls to unknown functions or with the wrong number of arguments
fn validate(expr: &Expr) -> Result<(), SelectorError> {
    match expr {
        Expr::Function(name, args) => {
            let (min, max) =
                arity(name).ok_or_else(|| SelectorError::UnknownFunction(name.clone()))?;
            if args.len() < min || max.map_or(false, |max| args.len() > max) {
                let expected = match max {
                    Some(max) if max == min => min.to_string(),
                    Some(max) => format!("{} to {}", min, max),
                    None => format!("at least {}", min),
                };
                return Err(SelectorError::Arity {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                });
            }
            args.iter().try_for_each(validate)
        }
        Expr::Or(l, r)
        | Expr::And(l, r)
        | Expr::Compare(l, _, r)
        | Expr::Arithmetic(l, _, r)
        | Expr::Union(l, r) => {
            validate(l)?;
            validate(r)
        }
        Expr::Negate(e) => validate(e),
        Expr::Path(path) => path.steps.iter().try_for_each(validate_step),
        Expr::Filter {
            primary,
            predicates,
            steps,
        } => {
            validate(primary)?;
            predicates.iter().try_for_each(validate)?;
            steps.iter().try_for_each(validate_step)
        }
        Expr::Literal(_) | Expr::Number(_) => Ok(()),
    }
}

#[cfg(test)]
#[test]
fn test_parse_abbreviated_paths() {
    let target = Expr::Path(LocationPath {
        absolute: true,
        steps: vec![
            descendant_or_self(),
            Step::new(Axis::Attribute, NodeTest::Name("id".to_string())),
        ],
    });
    assert_eq!(selector("//@id"), Ok(target));

    let target = Expr::Path(LocationPath {
        absolute: false,
        steps: vec![
            Step::new(Axis::Child, NodeTest::Name("a".to_string())),
            Step::new(Axis::Parent, NodeTest::Node),
            Step::new(Axis::SelfAxis, NodeTest::Node),
            Step::new(Axis::Child, NodeTest::Text),
        ],
    });
    assert_eq!(selector("A/.././text()"), Ok(target));

    let target = Expr::Path(LocationPath {
        absolute: true,
        steps: vec![],
    });
    assert_eq!(selector("/"), Ok(target));
}

#[cfg(test)]
#[test]
fn test_parse_predicates() {
    let i = r#"//div[@class='ad' and not(@id)][2]"#;
    let target = Expr::Path(LocationPath {
        absolute: true,
        steps: vec![
            descendant_or_self(),
            Step {
                axis: Axis::Child,
                test: NodeTest::Name("div".to_string()),
                predicates: vec![
                    Expr::And(
                        Box::new(Expr::Compare(
                            Box::new(Expr::Path(LocationPath {
                                absolute: false,
                                steps: vec![Step::new(
                                    Axis::Attribute,
                                    NodeTest::Name("class".to_string()),
                                )],
                            })),
                            CompareOp::Eq,
                            Box::new(Expr::Literal("ad".to_string())),
                        )),
                        Box::new(Expr::Function(
                            "not".to_string(),
                            vec![Expr::Path(LocationPath {
                                absolute: false,
                                steps: vec![Step::new(
                                    Axis::Attribute,
                                    NodeTest::Name("id".to_string()),
                                )],
                            })],
                        )),
                    ),
                    Expr::Number(2.0),
                ],
            },
        ],
    });
    assert_eq!(selector(i), Ok(target));
}

#[cfg(test)]
#[test]
fn test_parse_names_are_not_keywords() {
    // `textarea`, `order` and `data-id` start like node types, operators or arithmetic
    assert!(selector("//textarea").is_ok());
    assert!(selector("//order[@data-id]").is_ok());
    assert!(selector("//a[@x or @y]").is_ok());
    assert!(selector("descendant-or-self::node()").is_ok());
}

#[cfg(test)]
#[test]
fn test_parse_errors() {
    assert_eq!(selector(""), Err(SelectorError::Syntax { offset: 0 }));
    assert_eq!(selector("//div["), Err(SelectorError::Syntax { offset: 5 }));
    assert_eq!(selector("//div]"), Err(SelectorError::Syntax { offset: 5 }));
    assert_eq!(
        selector("//div[frobnicate()]"),
        Err(SelectorError::UnknownFunction("frobnicate".to_string()))
    );
    assert_eq!(
        selector("//div[contains(@id)]"),
        Err(SelectorError::Arity {
            name: "contains".to_string(),
            expected: "2".to_string(),
            found: 1
        })
    );
}
