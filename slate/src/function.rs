use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use bytecode::{BuiltInType, Chunk};

use crate::error::VmError;
use crate::operand::{Arguments, Returns, signature};
use crate::vm::VM;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionArgument {
    pub name: String,
    pub ty: BuiltInType,
}

impl FunctionArgument {
    pub fn new(name: impl Into<String>, ty: BuiltInType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Name and calling convention of a function.
///
/// Arguments are laid out left to right starting at the frame base, each
/// taking `ty.word_count()` words. The return value, if any, ends up at the
/// frame base once the function returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    name: String,
    return_type: Option<BuiltInType>,
    arguments: Vec<FunctionArgument>,
    argument_words: usize,
    return_words: usize,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        return_type: Option<BuiltInType>,
        arguments: Vec<FunctionArgument>,
    ) -> Self {
        let argument_words = arguments.iter().map(|arg| arg.ty.word_count()).sum();
        let return_words = return_type.map_or(0, BuiltInType::word_count);
        Self {
            name: name.into(),
            return_type,
            arguments,
            argument_words,
            return_words,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> Option<BuiltInType> {
        self.return_type
    }

    pub fn arguments(&self) -> &[FunctionArgument] {
        &self.arguments
    }

    #[inline(always)]
    pub fn argument_words(&self) -> usize {
        self.argument_words
    }

    #[inline(always)]
    pub fn return_words(&self) -> usize {
        self.return_words
    }

    /// Word offset from the frame base of the argument called `name`.
    pub fn word_index_of(&self, name: &str) -> Option<usize> {
        let mut index = 0;
        for arg in &self.arguments {
            if arg.name == name {
                return Some(index);
            }
            index += arg.ty.word_count();
        }
        None
    }

    /// Argument word offsets paired with their types.
    pub fn argument_slots(&self) -> impl Iterator<Item = (usize, BuiltInType)> + '_ {
        self.arguments.iter().scan(0, |index, arg| {
            let slot = *index;
            *index += arg.ty.word_count();
            Some((slot, arg.ty))
        })
    }

    /// Fails unless `A` and `R` match the declared argument and return types.
    pub fn check_signature<A: Arguments, R: Returns>(&self) -> Result<(), VmError> {
        let arguments_match = A::types()
            .into_iter()
            .eq(self.arguments.iter().map(|arg| arg.ty));
        if arguments_match && R::TYPE == self.return_type {
            return Ok(());
        }
        Err(VmError::SignatureMismatch {
            function: self.to_string(),
            found: signature::<A, R>(),
        })
    }
}

/// `int Sum(int a, int b)`
impl fmt::Display for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = self.return_type.map_or("void", BuiltInType::name);
        write!(f, "{ret} {}(", self.name)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", arg.ty, arg.name)?;
        }
        f.write_str(")")
    }
}

/// A compiled function: its definition plus the chunk holding its body.
#[derive(Debug)]
pub struct Function {
    definition: FunctionDefinition,
    chunk: Chunk,
}

impl Function {
    pub fn new(definition: FunctionDefinition, chunk: Chunk) -> Self {
        Self { definition, chunk }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    #[inline(always)]
    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    #[inline(always)]
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Checks the signature once and returns a handle that calls without
    /// checking again.
    pub fn typed<'vm, A: Arguments, R: Returns>(
        self: &Arc<Self>,
        vm: &'vm VM,
    ) -> Result<TypedFunction<'vm, A, R>, VmError> {
        self.definition.check_signature::<A, R>()?;
        Ok(TypedFunction {
            vm,
            function: Arc::clone(self),
            _signature: PhantomData,
        })
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.definition, f)
    }
}

/// A function whose signature has already been checked against `A -> R`.
pub struct TypedFunction<'vm, A, R> {
    vm: &'vm VM,
    function: Arc<Function>,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A: Arguments, R: Returns> TypedFunction<'_, A, R> {
    #[inline]
    pub fn call(&self, args: A) -> Result<R, VmError> {
        self.vm.call_unchecked(&self.function, args)
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::Object;

    fn sum() -> FunctionDefinition {
        FunctionDefinition::new("Sum", Some(BuiltInType::Int), vec![
            FunctionArgument::new("a", BuiltInType::Int),
            FunctionArgument::new("b", BuiltInType::Int),
        ])
    }

    #[test]
    fn word_counts_are_precomputed() {
        let def = sum();
        assert_eq!(def.argument_words(), 2 * BuiltInType::Int.word_count());
        assert_eq!(def.return_words(), BuiltInType::Int.word_count());

        let void = FunctionDefinition::new("Main", None, Vec::new());
        assert_eq!(void.argument_words(), 0);
        assert_eq!(void.return_words(), 0);
    }

    #[test]
    fn argument_offsets_skip_wide_values() {
        let def = FunctionDefinition::new("Mix", None, vec![
            FunctionArgument::new("flag", BuiltInType::Bool),
            FunctionArgument::new("amount", BuiltInType::Decimal),
            FunctionArgument::new("count", BuiltInType::Long),
        ]);
        let decimal_at = BuiltInType::Bool.word_count();
        let long_at = decimal_at + BuiltInType::Decimal.word_count();

        assert_eq!(def.word_index_of("flag"), Some(0));
        assert_eq!(def.word_index_of("amount"), Some(decimal_at));
        assert_eq!(def.word_index_of("count"), Some(long_at));
        assert_eq!(def.word_index_of("missing"), None);

        let slots: Vec<_> = def.argument_slots().collect();
        assert_eq!(slots, vec![
            (0, BuiltInType::Bool),
            (decimal_at, BuiltInType::Decimal),
            (long_at, BuiltInType::Long),
        ]);
    }

    #[test]
    fn display_reads_like_a_declaration() {
        assert_eq!(sum().to_string(), "int Sum(int a, int b)");
        let def = FunctionDefinition::new("Log", None, vec![FunctionArgument::new(
            "message",
            BuiltInType::Object,
        )]);
        assert_eq!(def.to_string(), "void Log(object message)");
    }

    #[test]
    fn signature_check() {
        let def = sum();
        assert!(def.check_signature::<(i32, i32), i32>().is_ok());
        assert!(matches!(
            def.check_signature::<(i32, i64), i32>(),
            Err(VmError::SignatureMismatch { .. })
        ));
        assert!(def.check_signature::<(i32, i32), ()>().is_err());
        assert!(def.check_signature::<(i32,), i32>().is_err());
        assert!(def.check_signature::<(i32, i32, Option<Object>), i32>().is_err());
    }
}
