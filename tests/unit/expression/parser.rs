use super::*;

#[test]
fn parses_arithmetic_precedence() {
    let e = parse_expr("1+2*3").unwrap();
    match e {
        Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(
            *right,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        )),
        other => panic!("unexpected ast: {other:?}"),
    }
}

#[test]
fn parses_calls_and_variables() {
    let e = parse_expr("atan2(v, u)").unwrap();
    match e {
        Expr::Call { func, args, span } => {
            assert_eq!(func, "atan2");
            assert_eq!(args.len(), 2);
            assert_eq!(span, Span { start: 0, end: 5 });
            assert!(matches!(&args[0], Expr::Var { name, .. } if name == "v"));
        }
        other => panic!("unexpected ast: {other:?}"),
    }
}

#[test]
fn accepts_float_suffix() {
    assert_eq!(parse_expr("0.0f").unwrap(), Expr::Num(0.0));
    assert_eq!(parse_expr("2f").unwrap(), Expr::Num(2.0));
    assert_eq!(parse_expr("1.5e2").unwrap(), Expr::Num(150.0));
}

#[test]
fn rejects_unbalanced_parentheses() {
    let err = parse_expr("sin(u").unwrap_err();
    assert!(err.message.contains("expected ')'"), "{}", err.message);
    assert_eq!(err.offset, 5);
}

#[test]
fn rejects_dangling_operator() {
    let err = parse_expr("u +").unwrap_err();
    assert!(err.message.contains("end of expression"), "{}", err.message);
}

#[test]
fn rejects_empty_input() {
    assert!(parse_expr("   ").is_err());
}

#[test]
fn rejects_statement_injection() {
    let err = parse_expr("1.0; } fn evil() { return 2.0").unwrap_err();
    assert!(err.message.contains("unexpected character ';'"));
    assert_eq!(err.offset, 3);
}

#[test]
fn rejects_integer_suffixes() {
    let err = parse_expr("3u").unwrap_err();
    assert!(err.message.contains("invalid number suffix"));
}

#[test]
fn nesting_is_bounded() {
    let ok = format!("{}u{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
    assert!(parse_expr(&ok).is_ok());

    let deep = format!("{}u{}", "(".repeat(10_000), ")".repeat(10_000));
    let err = parse_expr(&deep).unwrap_err();
    assert!(err.message.contains("nested too deeply"), "{}", err.message);
    assert_eq!(err.offset, MAX_DEPTH);
}

#[test]
fn unary_and_call_chains_are_bounded() {
    let negated = format!("{}u", "-".repeat(10_000));
    assert!(parse_expr(&negated).unwrap_err().message.contains("nested too deeply"));

    let calls = format!("{}u{}", "sin(".repeat(10_000), ")".repeat(10_000));
    assert!(parse_expr(&calls).unwrap_err().message.contains("nested too deeply"));
}

#[test]
fn long_operator_chains_are_bounded() {
    let short = format!("u{}", " + 1.0".repeat(MAX_DEPTH - 2));
    assert!(parse_expr(&short).is_ok());

    let long = format!("u{}", " * 2.0".repeat(MAX_DEPTH));
    let err = parse_expr(&long).unwrap_err();
    assert!(err.message.contains("nested too deeply"), "{}", err.message);
}
