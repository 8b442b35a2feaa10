use super::*;

fn eval(src: &str, vars: &[&str], inputs: &[f32]) -> f32 {
    let program = compile_scalar(src, vars).unwrap();
    let mut stack = Vec::new();
    program.eval(inputs, &mut stack).unwrap()
}

#[test]
fn evaluates_arithmetic_in_f32() {
    assert_eq!(eval("1 + 2 * 3", &[], &[]), 7.0);
    assert_eq!(eval("-(u - 4) / 2", &["u"], &[2.0]), 1.0);
    assert_eq!(eval("7 % 4", &[], &[]), 3.0);
    assert_eq!(eval("+u", &["u"], &[1.5]), 1.5);
}

#[test]
fn binds_inputs_by_slot() {
    assert_eq!(eval("u * 10 + v", &["u", "v"], &[2.0, 3.0]), 23.0);
}

#[test]
fn knows_pi() {
    let v = eval("cos(pi)", &[], &[]);
    assert!((v + 1.0).abs() < 1e-6);
}

#[test]
fn builtins_follow_wgsl_semantics() {
    assert_eq!(eval("sign(0)", &[], &[]), 0.0);
    assert_eq!(eval("sign(-3)", &[], &[]), -1.0);
    assert_eq!(eval("round(2.5)", &[], &[]), 2.0);
    assert_eq!(eval("fract(-0.25)", &[], &[]), 0.75);
    assert_eq!(eval("step(1, 1)", &[], &[]), 1.0);
    assert_eq!(eval("step(2, 1)", &[], &[]), 0.0);
    assert_eq!(eval("clamp(5, 0, 1)", &[], &[]), 1.0);
    assert_eq!(eval("mix(0, 10, 0.25)", &[], &[]), 2.5);
    assert_eq!(eval("smoothstep(0, 1, 0.5)", &[], &[]), 0.5);
    assert_eq!(eval("pow(2, 10)", &[], &[]), 1024.0);
    assert_eq!(eval("max(min(3, 4), 2)", &[], &[]), 3.0);
}

#[test]
fn clamp_with_inverted_bounds_does_not_panic() {
    assert_eq!(eval("clamp(0.5, 1, 0)", &[], &[]), 0.0);
}

#[test]
fn unknown_identifier_lists_candidates() {
    let err = compile_scalar("sin(q)", &["phi", "z"]).unwrap_err();
    assert_eq!(err.offset, 4);
    assert!(err.message.contains("unknown identifier 'q'"));
    assert!(err.message.contains("phi, z, pi"));
}

#[test]
fn arity_is_checked_at_compile_time() {
    let err = compile_scalar("pow(2)", &[]).unwrap_err();
    assert!(err.message.contains("'pow' expects 2 arguments, found 1"));
    let err = compile_scalar("nope(2)", &[]).unwrap_err();
    assert!(err.message.contains("unknown function 'nope'"));
}

#[test]
fn vec3_only_at_the_top_of_a_conversion() {
    assert!(compile_scalar("vec3(1, 2, 3)", &[]).is_err());

    let [x, y, z] = compile_vec3("vec3(cos(phi) * rho, sin(phi) * rho, z)", &["rho", "phi", "z"])
        .unwrap();
    let mut stack = Vec::new();
    let inputs = [3.0, 0.0, 5.0];
    assert_eq!(x.eval(&inputs, &mut stack).unwrap(), 3.0);
    assert_eq!(y.eval(&inputs, &mut stack).unwrap(), 0.0);
    assert_eq!(z.eval(&inputs, &mut stack).unwrap(), 5.0);

    let err = compile_vec3("u + v", &["r", "u", "v"]).unwrap_err();
    assert!(err.message.contains("must be a vec3"));
    let err = compile_vec3("vec3f(u, v)", &["r", "u", "v"]).unwrap_err();
    assert!(err.message.contains("expects 3 arguments, found 2"));
}

#[test]
fn tracks_stack_depth() {
    let p = compile_scalar("1 + (2 * (3 - 4))", &[]).unwrap();
    assert_eq!(p.max_stack(), 4);
    assert_eq!(p.inputs(), 0);
}

#[test]
fn eval_rejects_missing_inputs() {
    let p = compile_scalar("u + v", &["u", "v"]).unwrap();
    let mut stack = Vec::new();
    assert!(p.eval(&[1.0], &mut stack).is_err());
}

#[test]
fn diagnostics_point_at_the_error() {
    let src = "sin(u) + q";
    let err = compile_scalar(src, &["u"]).unwrap_err();
    let rendered = err.render("field", src);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "error: unknown identifier 'q' (expected one of: u, pi)");
    assert_eq!(lines[1], " --> field:1:10");
    assert_eq!(lines[3], "1 | sin(u) + q");
    assert_eq!(lines[4], "  |          ^");
}

#[test]
fn surface_check_collects_both_diagnostics() {
    let err = check_surface_expressions("u +", &["u", "v"], "vec3(u, v)", &["r", "u", "v"])
        .unwrap_err();
    assert!(err.contains("--> field:1:"));
    assert!(err.contains("--> conversion:1:"));
    assert!(check_surface_expressions("u * v", &["u", "v"], "vec3(u, v, r)", &["r", "u", "v"]).is_ok());
}
