use core::fmt;

use bytecode::BuiltInType;

use crate::error::VmError;
use crate::operand::{Operand, Returns};
use crate::stack::OperandStack;

/// Host code callable from bytecode.
///
/// The callee pops its arguments (last argument on top) and pushes its
/// result, if any, before returning.
pub trait NativeCall: Send + Sync {
    fn call(&self, stack: &mut OperandStack) -> Result<(), VmError>;
}

type Callback = Box<dyn Fn(&mut OperandStack) -> Result<(), VmError> + Send + Sync>;

/// A named host function with a declared signature, stored in constant
/// pools and invoked by `EXTERNAL_CALL`.
pub struct ExternalFunction {
    name: String,
    arguments: Vec<BuiltInType>,
    return_type: Option<BuiltInType>,
    argument_words: usize,
    return_words: usize,
    callback: Callback,
}

impl ExternalFunction {
    /// Wraps a callback that works on the stack directly.
    pub fn raw(
        name: impl Into<String>,
        arguments: Vec<BuiltInType>,
        return_type: Option<BuiltInType>,
        callback: impl Fn(&mut OperandStack) -> Result<(), VmError> + Send + Sync + 'static,
    ) -> Self {
        let argument_words = arguments.iter().map(|ty| ty.word_count()).sum();
        let return_words = return_type.map_or(0, BuiltInType::word_count);
        Self {
            name: name.into(),
            arguments,
            return_type,
            argument_words,
            return_words,
            callback: Box::new(callback),
        }
    }

    pub fn nullary<R, F>(name: impl Into<String>, f: F) -> Self
    where
        R: Returns,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self::raw(name, Vec::new(), R::TYPE, move |stack| f().push_result(stack))
    }

    pub fn unary<A, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: Operand,
        R: Returns,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::raw(name, vec![<A as Operand>::TYPE], R::TYPE, move |stack| {
            let a = A::pop_from(stack)?;
            f(a).push_result(stack)
        })
    }

    pub fn binary<A, B, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: Operand,
        B: Operand,
        R: Returns,
        F: Fn(A, B) -> R + Send + Sync + 'static,
    {
        let arguments = vec![<A as Operand>::TYPE, <B as Operand>::TYPE];
        Self::raw(name, arguments, R::TYPE, move |stack| {
            let b = B::pop_from(stack)?;
            let a = A::pop_from(stack)?;
            f(a, b).push_result(stack)
        })
    }

    pub fn ternary<A, B, C, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: Operand,
        B: Operand,
        C: Operand,
        R: Returns,
        F: Fn(A, B, C) -> R + Send + Sync + 'static,
    {
        let arguments = vec![
            <A as Operand>::TYPE,
            <B as Operand>::TYPE,
            <C as Operand>::TYPE,
        ];
        Self::raw(name, arguments, R::TYPE, move |stack| {
            let c = C::pop_from(stack)?;
            let b = B::pop_from(stack)?;
            let a = A::pop_from(stack)?;
            f(a, b, c).push_result(stack)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[BuiltInType] {
        &self.arguments
    }

    pub fn return_type(&self) -> Option<BuiltInType> {
        self.return_type
    }

    pub fn argument_words(&self) -> usize {
        self.argument_words
    }

    pub fn return_words(&self) -> usize {
        self.return_words
    }
}

impl NativeCall for ExternalFunction {
    #[inline]
    fn call(&self, stack: &mut OperandStack) -> Result<(), VmError> {
        (self.callback)(stack)
    }
}

impl fmt::Display for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = self.return_type.map_or("void", BuiltInType::name);
        let arguments: Vec<_> = self.arguments.iter().map(|ty| ty.name()).collect();
        write!(f, "extern {ret} {}({})", self.name, arguments.join(", "))
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}
