use crate::expression::bytecode::{Builtin, Op, ScalarProgram};

/// Runtime failure while evaluating a [`ScalarProgram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    /// Human readable message.
    pub message: String,
}

impl VmError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm error: {}", self.message)
    }
}

impl std::error::Error for VmError {}

impl ScalarProgram {
    /// Evaluate with `inputs[n]` bound to slot `n`, reusing `stack` between calls.
    pub fn eval(&self, inputs: &[f32], stack: &mut Vec<f32>) -> Result<f32, VmError> {
        if inputs.len() < self.inputs {
            return Err(VmError::new(format!(
                "program reads {} inputs, {} provided",
                self.inputs,
                inputs.len()
            )));
        }
        stack.clear();
        stack.reserve(self.max_stack);

        for &op in &self.ops {
            match op {
                Op::PushConst(v) => stack.push(v),
                Op::Load(slot) => stack.push(inputs[slot as usize]),
                Op::Neg => {
                    let v = pop(stack)?;
                    stack.push(-v);
                }
                Op::Add => bin(stack, |a, b| a + b)?,
                Op::Sub => bin(stack, |a, b| a - b)?,
                Op::Mul => bin(stack, |a, b| a * b)?,
                Op::Div => bin(stack, |a, b| a / b)?,
                Op::Rem => bin(stack, |a, b| a % b)?,
                Op::Call(id) => call_builtin(stack, id)?,
            }
        }

        if stack.len() != 1 {
            return Err(VmError::new(format!(
                "stack has {} values at end of program",
                stack.len()
            )));
        }
        pop(stack)
    }
}

fn pop(stack: &mut Vec<f32>) -> Result<f32, VmError> {
    stack.pop().ok_or_else(|| VmError::new("stack underflow"))
}

fn bin(stack: &mut Vec<f32>, f: impl FnOnce(f32, f32) -> f32) -> Result<(), VmError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(f(a, b));
    Ok(())
}

fn call_builtin(stack: &mut Vec<f32>, id: Builtin) -> Result<(), VmError> {
    let v = match id.arity() {
        1 => {
            let x = pop(stack)?;
            unary(id, x)
        }
        2 => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            match id {
                Builtin::Atan2 => a.atan2(b),
                Builtin::Pow => a.powf(b),
                Builtin::Min => a.min(b),
                Builtin::Max => a.max(b),
                // step(edge, x)
                Builtin::Step => {
                    if a <= b {
                        1.0
                    } else {
                        0.0
                    }
                }
                other => return Err(VmError::new(format!("{other:?} is not binary"))),
            }
        }
        _ => {
            let c = pop(stack)?;
            let b = pop(stack)?;
            let a = pop(stack)?;
            match id {
                // No f32::clamp: it panics when lo > hi.
                Builtin::Clamp => a.max(b).min(c),
                Builtin::Mix => a * (1.0 - c) + b * c,
                Builtin::Smoothstep => {
                    let t = ((c - a) / (b - a)).max(0.0).min(1.0);
                    t * t * (3.0 - 2.0 * t)
                }
                other => return Err(VmError::new(format!("{other:?} is not ternary"))),
            }
        }
    };
    stack.push(v);
    Ok(())
}

fn unary(id: Builtin, x: f32) -> f32 {
    match id {
        Builtin::Abs => x.abs(),
        Builtin::Sign => {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Builtin::Floor => x.floor(),
        Builtin::Ceil => x.ceil(),
        Builtin::Round => x.round_ties_even(),
        Builtin::Trunc => x.trunc(),
        Builtin::Fract => x - x.floor(),
        Builtin::Sqrt => x.sqrt(),
        Builtin::InverseSqrt => 1.0 / x.sqrt(),
        Builtin::Exp => x.exp(),
        Builtin::Exp2 => x.exp2(),
        Builtin::Log => x.ln(),
        Builtin::Log2 => x.log2(),
        Builtin::Sin => x.sin(),
        Builtin::Cos => x.cos(),
        Builtin::Tan => x.tan(),
        Builtin::Asin => x.asin(),
        Builtin::Acos => x.acos(),
        Builtin::Atan => x.atan(),
        Builtin::Sinh => x.sinh(),
        Builtin::Cosh => x.cosh(),
        Builtin::Tanh => x.tanh(),
        _ => f32::NAN,
    }
}
