use crate::expression::ast::{BinaryOp, Expr, UnaryOp};
use crate::expression::error::ExprError;

/// Math built-ins shared with WGSL. Names and argument order match the WGSL functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Abs,
    Sign,
    Floor,
    Ceil,
    Round,
    Trunc,
    Fract,
    Sqrt,
    InverseSqrt,
    Exp,
    Exp2,
    Log,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Atan2,
    Pow,
    Min,
    Max,
    Step,
    Clamp,
    Mix,
    Smoothstep,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "sign" => Self::Sign,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "trunc" => Self::Trunc,
            "fract" => Self::Fract,
            "sqrt" => Self::Sqrt,
            "inverseSqrt" => Self::InverseSqrt,
            "exp" => Self::Exp,
            "exp2" => Self::Exp2,
            "log" => Self::Log,
            "log2" => Self::Log2,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "atan2" => Self::Atan2,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            "step" => Self::Step,
            "clamp" => Self::Clamp,
            "mix" => Self::Mix,
            "smoothstep" => Self::Smoothstep,
            _ => return None,
        })
    }

    pub(crate) fn arity(self) -> usize {
        match self {
            Self::Atan2 | Self::Pow | Self::Min | Self::Max | Self::Step => 2,
            Self::Clamp | Self::Mix | Self::Smoothstep => 3,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Op {
    PushConst(f32),
    Load(u8),

    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    Call(Builtin),
}

/// A compiled scalar expression: stack bytecode over `f32` with numbered input slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarProgram {
    pub(crate) ops: Vec<Op>,
    pub(crate) max_stack: usize,
    pub(crate) inputs: usize,
}

impl ScalarProgram {
    /// Number of input slots the program reads.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Largest stack depth reached while evaluating.
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }
}

const VECTOR_CONSTRUCTORS: [&str; 2] = ["vec3", "vec3f"];

/// Compile a scalar expression over the variables `vars` (slot `n` is `vars[n]`).
pub fn compile_scalar(src: &str, vars: &[&str]) -> Result<ScalarProgram, ExprError> {
    let expr = crate::expression::parser::parse_expr(src)?;
    lower(&expr, vars)
}

/// Compile a `vec3(x, y, z)` conversion into one program per component.
pub fn compile_vec3(src: &str, vars: &[&str]) -> Result<[ScalarProgram; 3], ExprError> {
    let expr = crate::expression::parser::parse_expr(src)?;
    let Expr::Call { func, args, span } = expr else {
        return Err(ExprError::spanning(
            0,
            src.len(),
            "conversion must be a vec3(x, y, z) expression",
        ));
    };
    if !VECTOR_CONSTRUCTORS.contains(&func.as_str()) {
        return Err(ExprError::spanning(
            span.start,
            span.len(),
            format!("conversion must be a vec3(x, y, z) expression, found call to '{func}'"),
        ));
    }
    let [x, y, z] = args.as_slice() else {
        return Err(ExprError::spanning(
            span.start,
            span.len(),
            format!("'{func}' expects 3 arguments, found {}", args.len()),
        ));
    };
    Ok([lower(x, vars)?, lower(y, vars)?, lower(z, vars)?])
}

fn lower(expr: &Expr, vars: &[&str]) -> Result<ScalarProgram, ExprError> {
    let mut lowering = Lowering {
        vars,
        ops: Vec::new(),
        depth: 0,
        max_stack: 0,
    };
    lowering.emit_expr(expr)?;
    Ok(ScalarProgram {
        ops: lowering.ops,
        max_stack: lowering.max_stack,
        inputs: vars.len(),
    })
}

struct Lowering<'a> {
    vars: &'a [&'a str],
    ops: Vec<Op>,
    depth: usize,
    max_stack: usize,
}

impl Lowering<'_> {
    fn push(&mut self, op: Op, pops: usize) {
        self.depth = self.depth - pops + 1;
        self.max_stack = self.max_stack.max(self.depth);
        self.ops.push(op);
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), ExprError> {
        match expr {
            Expr::Num(v) => self.push(Op::PushConst(*v as f32), 0),
            Expr::Var { name, span } => {
                if let Some(slot) = self.vars.iter().position(|v| v == name) {
                    let slot = u8::try_from(slot)
                        .map_err(|_| ExprError::new(span.start, "too many input variables"))?;
                    self.push(Op::Load(slot), 0);
                } else if name == "pi" {
                    self.push(Op::PushConst(std::f32::consts::PI), 0);
                } else {
                    let mut known: Vec<&str> = self.vars.to_vec();
                    known.push("pi");
                    return Err(ExprError::spanning(
                        span.start,
                        span.len(),
                        format!(
                            "unknown identifier '{name}' (expected one of: {})",
                            known.join(", ")
                        ),
                    ));
                }
            }
            Expr::Unary { op, expr } => {
                self.emit_expr(expr)?;
                match op {
                    UnaryOp::Neg => self.push(Op::Neg, 1),
                }
            }
            Expr::Binary { op, left, right } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                let op = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Rem => Op::Rem,
                };
                self.push(op, 2);
            }
            Expr::Call { func, args, span } => {
                if VECTOR_CONSTRUCTORS.contains(&func.as_str()) {
                    return Err(ExprError::spanning(
                        span.start,
                        span.len(),
                        format!("'{func}' is only allowed as the whole conversion expression"),
                    ));
                }
                let Some(builtin) = Builtin::from_name(func) else {
                    return Err(ExprError::spanning(
                        span.start,
                        span.len(),
                        format!("unknown function '{func}'"),
                    ));
                };
                if args.len() != builtin.arity() {
                    return Err(ExprError::spanning(
                        span.start,
                        span.len(),
                        format!(
                            "'{func}' expects {} argument{}, found {}",
                            builtin.arity(),
                            if builtin.arity() == 1 { "" } else { "s" },
                            args.len()
                        ),
                    ));
                }
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.push(Op::Call(builtin), args.len());
            }
        }
        Ok(())
    }
}
