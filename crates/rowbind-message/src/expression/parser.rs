//! nom parser for message expressions.
//!
//! Precedence, lowest first: ternary, `||`/`or`, `&&`/`and`, equality,
//! comparison, additive, multiplicative, unary, primary.

use nom::{
    Finish, IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value},
    error::{VerboseError, VerboseErrorKind},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use rowbind_model::Value;

use super::ast::{BinaryOp, Expr, UnaryOp};

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse a complete expression. The error is a human-readable description.
pub fn parse_expression(input: &str) -> Result<Expr, String> {
    match all_consuming(ws(expression))(input).finish() {
        Ok((_, expr)) => Ok(expr),
        Err(error) => Err(describe_error(input, &error)),
    }
}

fn describe_error(input: &str, error: &VerboseError<&str>) -> String {
    let Some((remaining, kind)) = error.errors.first() else {
        return "invalid expression".to_string();
    };
    let detail = match kind {
        VerboseErrorKind::Char(c) => format!("expected '{c}'"),
        VerboseErrorKind::Context(context) => (*context).to_string(),
        VerboseErrorKind::Nom(kind) => kind.description().to_string(),
    };
    if remaining.is_empty() {
        format!("unexpected end of expression ({detail})")
    } else {
        let offset = input.len() - remaining.len();
        let snippet: String = remaining.chars().take(16).collect();
        format!("unexpected input at offset {offset}: '{snippet}' ({detail})")
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    F: FnMut(&'a str) -> ParseResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A word that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn expression(input: &str) -> ParseResult<'_, Expr> {
    let (input, condition) = or_expr(input)?;
    let (input, branches) = opt(pair(
        preceded(ws(char('?')), expression),
        preceded(ws(char(':')), expression),
    ))(input)?;
    let expr = match branches {
        Some((then, otherwise)) => {
            Expr::Ternary(Box::new(condition), Box::new(then), Box::new(otherwise))
        }
        None => condition,
    };
    Ok((input, expr))
}

/// Left-associative binary level: `operand (operator operand)*`.
fn binary_level<'a>(
    input: &'a str,
    operand: fn(&'a str) -> ParseResult<'a, Expr>,
    operator: fn(&'a str) -> ParseResult<'a, BinaryOp>,
) -> ParseResult<'a, Expr> {
    let (input, first) = operand(input)?;
    fold_many0(
        pair(ws(operator), operand),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
    )(input)
}

fn or_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, and_expr, or_op)
}

fn and_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, equality_expr, and_op)
}

fn equality_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, comparison_expr, equality_op)
}

fn comparison_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, additive_expr, comparison_op)
}

fn additive_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, multiplicative_expr, additive_op)
}

fn multiplicative_expr(input: &str) -> ParseResult<'_, Expr> {
    binary_level(input, unary_expr, multiplicative_op)
}

fn or_op(input: &str) -> ParseResult<'_, BinaryOp> {
    value(BinaryOp::Or, alt((tag("||"), keyword("or"))))(input)
}

fn and_op(input: &str) -> ParseResult<'_, BinaryOp> {
    value(BinaryOp::And, alt((tag("&&"), keyword("and"))))(input)
}

fn equality_op(input: &str) -> ParseResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Eq, keyword("eq")),
        value(BinaryOp::Ne, keyword("ne")),
    ))(input)
}

fn comparison_op(input: &str) -> ParseResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Le, keyword("le")),
        value(BinaryOp::Ge, keyword("ge")),
        value(BinaryOp::Lt, keyword("lt")),
        value(BinaryOp::Gt, keyword("gt")),
    ))(input)
}

fn additive_op(input: &str) -> ParseResult<'_, BinaryOp> {
    alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))(input)
}

fn multiplicative_op(input: &str) -> ParseResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Rem, char('%')),
        value(BinaryOp::Div, keyword("div")),
        value(BinaryOp::Rem, keyword("mod")),
    ))(input)
}

fn unary_expr(input: &str) -> ParseResult<'_, Expr> {
    alt((
        map(
            preceded(ws(alt((tag("!"), keyword("not")))), unary_expr),
            |expr| Expr::Unary(UnaryOp::Not, Box::new(expr)),
        ),
        map(preceded(ws(char('-')), unary_expr), |expr| {
            Expr::Unary(UnaryOp::Neg, Box::new(expr))
        }),
        ws(primary),
    ))(input)
}

fn primary(input: &str) -> ParseResult<'_, Expr> {
    alt((
        delimited(char('('), ws(expression), char(')')),
        number,
        map(string_literal, |s| Expr::Literal(Value::Text(s))),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        call,
        map(identifier, |name| Expr::Variable(name.to_string())),
    ))(input)
}

fn number(input: &str) -> ParseResult<'_, Expr> {
    alt((
        map_res(recognize(tuple((digit1, char('.'), digit1))), |s: &str| {
            s.parse::<f64>().map(|f| Expr::Literal(Value::Float(f)))
        }),
        map_res(digit1, |s: &str| {
            s.parse::<i64>().map(|i| Expr::Literal(Value::Integer(i)))
        }),
    ))(input)
}

fn string_literal(input: &str) -> ParseResult<'_, String> {
    alt((quoted('\''), quoted('"')))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> ParseResult<'a, String> {
    move |input| {
        let (input, _) = char(quote)(input)?;
        let (input, chars) = many0(alt((
            map(preceded(char('\\'), anychar), |c| match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            }),
            satisfy(move |c| c != quote && c != '\\'),
        )))(input)?;
        let (input, _) = char(quote)(input)?;
        Ok((input, chars.into_iter().collect()))
    }
}

fn identifier(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

/// `name(args)` or `namespace:name(args)`.
fn call(input: &str) -> ParseResult<'_, Expr> {
    let (input, name) = recognize(pair(identifier, opt(pair(char(':'), identifier))))(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(char(','), ws(expression)),
        char(')'),
    )(input)?;
    Ok((
        input,
        Expr::Call {
            name: name.to_string(),
            args,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Integer(i)))
    }

    #[test]
    fn precedence_of_arithmetic() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                int(1),
                Box::new(Expr::Binary(BinaryOp::Mul, int(2), int(3)))
            )
        );
    }

    #[test]
    fn ternary_with_namespaced_call() {
        let expr = parse_expression("inclusive ? 'a' : f:join(values, ', ')").unwrap();
        let Expr::Ternary(cond, _, otherwise) = expr else {
            panic!("expected ternary");
        };
        assert_eq!(*cond, Expr::Variable("inclusive".to_string()));
        assert!(matches!(*otherwise, Expr::Call { ref name, ref args } if name == "f:join" && args.len() == 2));
    }

    #[test]
    fn keywords_do_not_swallow_identifiers() {
        let expr = parse_expression("order").unwrap();
        assert_eq!(expr, Expr::Variable("order".to_string()));
        let expr = parse_expression("a and not b").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::And, _, _)));
    }

    #[test]
    fn string_escapes() {
        let expr = parse_expression(r#"'it\'s' + "x""#).unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(Value::text("it's"))),
                Box::new(Expr::Literal(Value::text("x")))
            )
        );
    }

    #[test]
    fn unbalanced_parenthesis_is_an_error() {
        let error = parse_expression("(").unwrap_err();
        assert!(error.contains("unexpected"), "{error}");
        assert!(parse_expression("").is_err());
        assert!(parse_expression("1 +").is_err());
    }
}
