//! Compiles the arithmetic expressions found in `pattern` clauses into
//! postfix order, so that sub-expression matching becomes a slice search.

use std::fmt;

use pest::iterators::Pair;
use tracing::trace;

use crate::error::{PqlError, Result};
use crate::parser::Rule;
use crate::scan;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
}

impl Operator {
    /// All operators are left associative.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Plus | Operator::Minus => 1,
            Operator::Times | Operator::Divide => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Plus => '+',
            Operator::Minus => '-',
            Operator::Times => '*',
            Operator::Divide => '/',
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Operator::Plus),
            "-" => Some(Operator::Minus),
            "*" => Some(Operator::Times),
            "/" => Some(Operator::Divide),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Name(String),
    /// Kept as text; constants are compared, never computed with.
    Constant(String),
    Operator(Operator),
    LeftParen,
    RightParen,
}

impl Token {
    pub fn name(name: impl Into<String>) -> Self {
        Token::Name(name.into())
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Token::Constant(value.into())
    }

    fn is_operand(&self) -> bool {
        matches!(self, Token::Name(_) | Token::Constant(_))
    }

    fn from_pair(pair: Pair<'_, Rule>) -> Result<Self> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| PqlError::syntax("empty expression token"))?;
        let text = inner.as_str();

        Ok(match inner.as_rule() {
            Rule::expr_name => Token::name(text),
            Rule::expr_constant => Token::constant(text),
            Rule::expr_operator => Token::Operator(
                Operator::from_symbol(text)
                    .ok_or_else(|| PqlError::syntax(format!("unknown operator {:?}", text)))?,
            ),
            Rule::expr_lparen => Token::LeftParen,
            Rule::expr_rparen => Token::RightParen,
            rule => unreachable!("unexpected expression token {:?}", rule),
        })
    }
}

/// Splits expression text into tokens. Anything other than whitespace
/// between recognized tokens is rejected.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for found in scan::find_all(Rule::expr_token, text) {
        reject_gap(&text[last_end..found.start])?;
        last_end = found.end();
        tokens.push(Token::from_pair(found.pair)?);
    }
    reject_gap(&text[last_end..])?;

    Ok(tokens)
}

fn reject_gap(gap: &str) -> Result<()> {
    match gap.trim().chars().next() {
        Some(c) => Err(PqlError::syntax(format!(
            "unexpected character {:?} in expression",
            c
        ))),
        None => Ok(()),
    }
}

/// Reorders an infix token sequence into postfix.
///
/// The input must alternate operands and operators, with parentheses only
/// where an operand could start or end. Anything else, including an empty
/// sequence, is a syntax error.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut pending: Vec<&Token> = Vec::new();
    let mut expect_operand = true;

    for token in tokens {
        match token {
            Token::Name(_) | Token::Constant(_) => {
                if !expect_operand {
                    return Err(PqlError::syntax(format!(
                        "expected an operator before '{}'",
                        token
                    )));
                }
                output.push(token.clone());
                expect_operand = false;
            }
            Token::LeftParen => {
                if !expect_operand {
                    return Err(PqlError::syntax("expected an operator before '('"));
                }
                pending.push(token);
            }
            Token::RightParen => {
                if expect_operand {
                    return Err(PqlError::syntax("expected an operand before ')'"));
                }
                loop {
                    match pending.pop() {
                        Some(Token::LeftParen) => break,
                        Some(op) => output.push(op.clone()),
                        None => return Err(PqlError::syntax("unbalanced ')' in expression")),
                    }
                }
            }
            Token::Operator(op) => {
                if expect_operand {
                    return Err(PqlError::syntax(format!(
                        "operator '{}' is missing its left operand",
                        op
                    )));
                }
                while let Some(Token::Operator(top)) = pending.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Operator(*top));
                    pending.pop();
                }
                pending.push(token);
                expect_operand = true;
            }
        }
    }

    if expect_operand {
        return Err(PqlError::syntax("expression is incomplete"));
    }
    while let Some(token) = pending.pop() {
        if *token == Token::LeftParen {
            return Err(PqlError::syntax("unbalanced '(' in expression"));
        }
        output.push(token.clone());
    }

    Ok(output)
}

/// Tokenizes and compiles expression text in one step.
pub fn compile(text: &str) -> Result<Vec<Token>> {
    let tokens = tokenize(text)?;
    let postfix = to_postfix(&tokens)?;
    trace!(expression = text, postfix = %Postfix(&postfix), "compiled expression");
    Ok(postfix)
}

/// Rebuilds infix text from postfix, parenthesizing every nested operation.
pub fn to_infix(postfix: &[Token]) -> Result<String> {
    // (text, is_compound)
    let mut stack: Vec<(String, bool)> = Vec::new();

    for token in postfix {
        if token.is_operand() {
            stack.push((token.to_string(), false));
            continue;
        }
        let op = match token {
            Token::Operator(op) => op,
            _ => return Err(PqlError::syntax("parenthesis in postfix expression")),
        };
        let (rhs, lhs) = match (stack.pop(), stack.pop()) {
            (Some(rhs), Some(lhs)) => (rhs, lhs),
            _ => return Err(PqlError::syntax(format!("operator '{}' lacks operands", op))),
        };
        stack.push((format!("{}{}{}", wrap(lhs), op, wrap(rhs)), true));
    }

    match stack.pop() {
        Some((text, _)) if stack.is_empty() => Ok(text),
        _ => Err(PqlError::syntax("postfix expression does not reduce to one value")),
    }
}

fn wrap((text, is_compound): (String, bool)) -> String {
    if is_compound {
        format!("({})", text)
    } else {
        text
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(text) | Token::Constant(text) => f.write_str(text),
            Token::Operator(op) => write!(f, "{}", op),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
        }
    }
}

/// Space-separated postfix tokens, as they are stored.
pub(crate) struct Postfix<'a>(pub(crate) &'a [Token]);

impl fmt::Display for Postfix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn postfix_text(text: &str) -> String {
        Postfix(&compile(text).unwrap()).to_string()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize(" x1 +20*(y)").unwrap(),
            vec![
                Token::name("x1"),
                Token::Operator(Operator::Plus),
                Token::constant("20"),
                Token::Operator(Operator::Times),
                Token::LeftParen,
                Token::name("y"),
                Token::RightParen,
            ]
        );
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("a % b").unwrap_err().is_syntax());
        assert!(tokenize("01").unwrap_err().is_syntax());
        assert!(tokenize("1a").unwrap_err().is_syntax());
    }

    #[test]
    fn test_postfix_order() {
        assert_eq!(postfix_text("y+1"), "y 1 +");
        assert_eq!(postfix_text("a + b * c"), "a b c * +");
        assert_eq!(postfix_text("(a + b) * c"), "a b + c *");
        assert_eq!(postfix_text("a - b - c"), "a b - c -");
        assert_eq!(postfix_text("a / b * c"), "a b / c *");
        assert_eq!(postfix_text("a - (b - c)"), "a b c - -");
        assert_eq!(postfix_text("((x))"), "x");
        assert_eq!(postfix_text("v * (w + x) / y - z"), "v w x + * y / z -");
    }

    #[test]
    fn test_malformed_expressions() {
        for text in ["", "+a", "a+", "(a", "a)", "()", "a b", "a (b)", "(a)(b)", "a + * b"] {
            let err = compile(text).unwrap_err();
            assert!(err.is_syntax(), "{:?} gave {:?}", text, err);
        }
    }

    #[test]
    fn test_to_infix() {
        assert_eq!(to_infix(&compile("y + 1").unwrap()).unwrap(), "y+1");
        assert_eq!(
            to_infix(&compile("a * (b + c) - d").unwrap()).unwrap(),
            "(a*(b+c))-d"
        );
        assert!(to_infix(&[Token::Operator(Operator::Plus)]).is_err());
        assert!(to_infix(&[Token::name("a"), Token::name("b")]).is_err());
        assert!(to_infix(&[]).is_err());
    }

    #[derive(Clone, Debug)]
    enum Expr {
        Const(i64),
        Var(usize),
        Bin(Box<Expr>, Operator, Box<Expr>),
    }

    const VARS: [(&str, i64); 3] = [("x", 3), ("y", -7), ("z", 11)];

    fn apply(op: Operator, lhs: i64, rhs: i64) -> i64 {
        match op {
            Operator::Plus => lhs.wrapping_add(rhs),
            Operator::Minus => lhs.wrapping_sub(rhs),
            Operator::Times => lhs.wrapping_mul(rhs),
            Operator::Divide => lhs.checked_div(rhs).unwrap_or(0),
        }
    }

    impl Expr {
        fn eval(&self) -> i64 {
            match self {
                Expr::Const(n) => *n,
                Expr::Var(i) => VARS[*i].1,
                Expr::Bin(lhs, op, rhs) => apply(*op, lhs.eval(), rhs.eval()),
            }
        }

        fn precedence(&self) -> u8 {
            match self {
                Expr::Bin(_, op, _) => op.precedence(),
                _ => u8::MAX,
            }
        }

        /// Renders with only the parentheses precedence and left
        /// associativity require.
        fn render(&self) -> String {
            match self {
                Expr::Const(n) => n.to_string(),
                Expr::Var(i) => VARS[*i].0.to_owned(),
                Expr::Bin(lhs, op, rhs) => {
                    let mut left = lhs.render();
                    if lhs.precedence() < op.precedence() {
                        left = format!("({})", left);
                    }
                    let mut right = rhs.render();
                    if rhs.precedence() <= op.precedence() {
                        right = format!("( {} )", right);
                    }
                    format!("{} {} {}", left, op, right)
                }
            }
        }
    }

    fn eval_postfix(postfix: &[Token]) -> i64 {
        let mut stack = Vec::new();
        for token in postfix {
            match token {
                Token::Constant(n) => stack.push(n.parse::<i64>().unwrap()),
                Token::Name(name) => {
                    stack.push(VARS.iter().find(|(var, _)| var == name).unwrap().1)
                }
                Token::Operator(op) => {
                    let rhs = stack.pop().unwrap();
                    let lhs = stack.pop().unwrap();
                    stack.push(apply(*op, lhs, rhs));
                }
                paren => panic!("unexpected {:?} in postfix", paren),
            }
        }
        assert_eq!(stack.len(), 1);
        stack[0]
    }

    fn arb_operator() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Plus),
            Just(Operator::Minus),
            Just(Operator::Times),
            Just(Operator::Divide),
        ]
    }

    fn arb_expr() -> impl Strategy<Value = Expr> {
        let leaf = prop_oneof![
            (0i64..100).prop_map(Expr::Const),
            (0usize..VARS.len()).prop_map(Expr::Var),
        ];
        leaf.prop_recursive(4, 32, 2, |inner| {
            (inner.clone(), arb_operator(), inner)
                .prop_map(|(lhs, op, rhs)| Expr::Bin(Box::new(lhs), op, Box::new(rhs)))
        })
    }

    proptest! {
        #[test]
        fn postfix_preserves_value(expr in arb_expr()) {
            let text = expr.render();
            let postfix = compile(&text).unwrap();
            prop_assert_eq!(eval_postfix(&postfix), expr.eval(), "{}", text);

            let infix = to_infix(&postfix).unwrap();
            prop_assert_eq!(compile(&infix).unwrap(), postfix);
        }
    }
}
