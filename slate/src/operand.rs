//! Conversions between host values and operand stack values.

use bytecode::{BuiltInType, Decimal, Object};

use crate::error::VmError;
use crate::stack::OperandStack;

/// A host type with a fixed [`BuiltInType`] that can travel over the stack.
pub trait Operand: Sized {
    const TYPE: BuiltInType;

    fn push_onto(self, stack: &mut OperandStack) -> Result<(), VmError>;

    fn pop_from(stack: &mut OperandStack) -> Result<Self, VmError>;
}

macro_rules! primitive_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Operand for $ty {
                const TYPE: BuiltInType = <$ty as bytecode::Primitive>::TYPE;

                #[inline(always)]
                fn push_onto(self, stack: &mut OperandStack) -> Result<(), VmError> {
                    stack.push(self)
                }

                #[inline(always)]
                fn pop_from(stack: &mut OperandStack) -> Result<Self, VmError> {
                    stack.pop()
                }
            }
        )*
    };
}

primitive_operand!(bool, u8, i8, char, Decimal, f64, f32, i32, u32, i64, u64, i16, u16);

impl Operand for Option<Object> {
    const TYPE: BuiltInType = BuiltInType::Object;

    fn push_onto(self, stack: &mut OperandStack) -> Result<(), VmError> {
        stack.push_object(self)
    }

    fn pop_from(stack: &mut OperandStack) -> Result<Self, VmError> {
        stack.pop_object()
    }
}

/// An argument list, pushed left to right.
pub trait Arguments {
    fn types() -> Vec<BuiltInType>;

    fn push_all(self, stack: &mut OperandStack) -> Result<(), VmError>;
}

macro_rules! tuple_arguments {
    ($($name:ident),*) => {
        impl<$($name: Operand),*> Arguments for ($($name,)*) {
            fn types() -> Vec<BuiltInType> {
                vec![$(<$name as Operand>::TYPE),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn push_all(self, stack: &mut OperandStack) -> Result<(), VmError> {
                let ($($name,)*) = self;
                $($name.push_onto(stack)?;)*
                Ok(())
            }
        }
    };
}

tuple_arguments!();
tuple_arguments!(A);
tuple_arguments!(A, B);
tuple_arguments!(A, B, C);
tuple_arguments!(A, B, C, D);

/// What a call leaves behind: nothing for `()`, otherwise one operand.
pub trait Returns: Sized {
    const TYPE: Option<BuiltInType>;

    fn pop_result(stack: &mut OperandStack) -> Result<Self, VmError>;

    fn push_result(self, stack: &mut OperandStack) -> Result<(), VmError>;
}

impl Returns for () {
    const TYPE: Option<BuiltInType> = None;

    fn pop_result(_stack: &mut OperandStack) -> Result<Self, VmError> {
        Ok(())
    }

    fn push_result(self, _stack: &mut OperandStack) -> Result<(), VmError> {
        Ok(())
    }
}

impl<T: Operand> Returns for T {
    const TYPE: Option<BuiltInType> = Some(<T as Operand>::TYPE);

    fn pop_result(stack: &mut OperandStack) -> Result<Self, VmError> {
        T::pop_from(stack)
    }

    fn push_result(self, stack: &mut OperandStack) -> Result<(), VmError> {
        self.push_onto(stack)
    }
}

/// `(int, int) -> int`, used in signature errors.
pub fn signature<A: Arguments, R: Returns>() -> String {
    let arguments: Vec<_> = A::types().iter().map(|ty| ty.name()).collect();
    let ret = R::TYPE.map_or("void", BuiltInType::name);
    format!("({}) -> {ret}", arguments.join(", "))
}
