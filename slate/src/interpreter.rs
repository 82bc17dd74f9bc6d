use std::sync::Arc;

use bytecode::{BuiltInType, Decimal, Instruction, Op};
use log::{Level, debug, log_enabled, trace};

use crate::error::VmError;
use crate::frame::{Frame, FrameStack};
use crate::function::{Function, FunctionDefinition};
use crate::native::{ExternalFunction, NativeCall};
use crate::operand::{Arguments, Returns};
use crate::stack::OperandStack;

enum Flow {
    Continue,
    Halt,
}

/// Pushes a frame for `function`. Its arguments must already be the top
/// `argument_words` words of `stack`.
pub fn call(
    frames: &mut FrameStack,
    stack: &mut OperandStack,
    function: Arc<Function>,
) -> Result<(), VmError> {
    let definition = function.definition();
    let base = stack
        .offset()
        .checked_sub(definition.argument_words())
        .ok_or(VmError::StackUnderflow)?;

    if log_enabled!(Level::Debug) {
        debug!(
            "enter {}({})",
            definition.name(),
            describe_arguments(stack, base, definition)
        );
    }

    if !frames.try_push(Frame {
        function,
        ip: 0,
        base,
    }) {
        return Err(VmError::CallStackOverflow {
            depth: frames.max_frames(),
        });
    }
    Ok(())
}

/// Runs until the frame stack is empty.
pub fn run(frames: &mut FrameStack, stack: &mut OperandStack) -> Result<(), VmError> {
    loop {
        let Some(frame) = frames.current_mut() else {
            return Ok(());
        };
        let ip = frame.ip;
        frame.ip += 1;

        let fetched = frame
            .function
            .chunk()
            .code()
            .get(ip)
            .and_then(Instruction::decode);
        let instruction = match fetched {
            Ok(instruction) => instruction,
            Err(err) => return Err(report(frames, ip, err.into())),
        };
        trace!("{}:{ip:04} {instruction}", frame.function.name());

        match step(frames, stack, instruction) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt) => return Ok(()),
            Err(err) => return Err(report(frames, ip, err)),
        }
    }
}

/// Pushes `args`, runs `function` to completion on the given stack and
/// frames, and pops its result.
///
/// Signatures are not checked here. On error the frames are cleared but the
/// stack is left as it was at the failure.
pub fn execute<A: Arguments, R: Returns>(
    frames: &mut FrameStack,
    stack: &mut OperandStack,
    function: &Arc<Function>,
    args: A,
) -> Result<R, VmError> {
    let definition = function.definition();
    let start = stack.offset();

    args.push_all(stack)?;
    let pushed = stack.offset() - start;
    if pushed != definition.argument_words() {
        return Err(VmError::ArgumentCountMismatch {
            expected: definition.argument_words(),
            found: pushed,
        });
    }

    let outcome = call(frames, stack, Arc::clone(function)).and_then(|()| run(frames, stack));
    if let Err(err) = outcome {
        frames.clear();
        return Err(err);
    }

    let left = stack
        .offset()
        .checked_sub(start)
        .ok_or(VmError::StackUnderflow)?;
    if left != definition.return_words() {
        return Err(VmError::ReturnCountMismatch {
            function: definition.name().to_string(),
            expected: definition.return_words(),
            found: left,
        });
    }
    R::pop_result(stack)
}

fn step(
    frames: &mut FrameStack,
    stack: &mut OperandStack,
    instruction: Instruction,
) -> Result<Flow, VmError> {
    let Some(frame) = frames.current() else {
        return Ok(Flow::Halt);
    };
    let constants = frame.function.chunk().constants();

    match instruction {
        Instruction::Constant { ty, position } => dispatch_primitive!(
            ty,
            T => stack.push(constants.read::<T>(position)?)?,
            object => stack.push_object(constants.read_object(position)?)?,
        ),
        Instruction::Add { ty } => add(stack, ty)?,
        Instruction::Pop { ty } => dispatch_primitive!(
            ty,
            T => {
                stack.pop::<T>()?;
            },
            object => {
                stack.pop_object()?;
            },
        ),
        Instruction::SetLocal { ty, offset } => {
            let slot = frame.base + offset as usize;
            dispatch_primitive!(
                ty,
                T => {
                    let value = stack.pop::<T>()?;
                    stack.write_at(slot, value)?;
                },
                object => set_local_object(stack, slot)?,
            )
        }
        Instruction::GetLocal { ty, offset } => {
            let slot = frame.base + offset as usize;
            dispatch_primitive!(
                ty,
                T => {
                    let value = stack.read_at::<T>(slot)?;
                    stack.push(value)?;
                },
                object => get_local_object(stack, slot)?,
            )
        }
        Instruction::Call { position } => {
            let callee = constants.read_as::<Function>(position)?;
            call(frames, stack, callee)?;
        }
        Instruction::ExternalCall { position } => {
            let native = constants.read_as::<ExternalFunction>(position)?;
            external_call(stack, &native)?;
        }
        Instruction::Return => return ret(frames, stack),
    }
    Ok(Flow::Continue)
}

fn add(stack: &mut OperandStack, ty: BuiltInType) -> Result<(), VmError> {
    macro_rules! wrapping {
        ($t:ty) => {{
            let b = stack.pop::<$t>()?;
            let a = stack.pop::<$t>()?;
            stack.push(a.wrapping_add(b))
        }};
    }
    macro_rules! float {
        ($t:ty) => {{
            let b = stack.pop::<$t>()?;
            let a = stack.pop::<$t>()?;
            stack.push(a + b)
        }};
    }

    match ty {
        BuiltInType::Byte => wrapping!(u8),
        BuiltInType::SByte => wrapping!(i8),
        BuiltInType::Short => wrapping!(i16),
        BuiltInType::UShort => wrapping!(u16),
        BuiltInType::Int => wrapping!(i32),
        BuiltInType::UInt => wrapping!(u32),
        BuiltInType::Long => wrapping!(i64),
        BuiltInType::ULong => wrapping!(u64),
        BuiltInType::Float => float!(f32),
        BuiltInType::Double => float!(f64),
        BuiltInType::Decimal => {
            let b = stack.pop::<Decimal>()?;
            let a = stack.pop::<Decimal>()?;
            let sum = a
                .checked_add(b)
                .ok_or(VmError::ArithmeticOverflow { op: Op::Add, ty })?;
            stack.push(sum)
        }
        BuiltInType::Bool | BuiltInType::Char | BuiltInType::Object => {
            Err(VmError::InvalidOperand { op: Op::Add, ty })
        }
    }
}

fn get_local_object(stack: &mut OperandStack, slot: usize) -> Result<(), VmError> {
    let handle = stack.read_handle_at(slot)?;
    let copy = stack.duplicate_handle(handle)?;
    if let Err(err) = stack.push_handle(copy) {
        stack.release_handle(copy)?;
        return Err(err);
    }
    Ok(())
}

/// Moves the top handle into `slot` and releases the handle it replaces.
fn set_local_object(stack: &mut OperandStack, slot: usize) -> Result<(), VmError> {
    let handle = stack.pop_handle()?;
    let previous = match stack.read_handle_at(slot) {
        Ok(previous) => previous,
        Err(err) => {
            stack.release_handle(handle)?;
            return Err(err);
        }
    };
    stack.write_handle_at(slot, handle)?;
    stack.release_handle(previous)
}

fn external_call(stack: &mut OperandStack, native: &ExternalFunction) -> Result<(), VmError> {
    let base = stack
        .offset()
        .checked_sub(native.argument_words())
        .ok_or(VmError::StackUnderflow)?;
    debug!("extern {native}");

    native.call(stack)?;

    let expected = base + native.return_words();
    if stack.offset() != expected {
        return Err(VmError::ReturnCountMismatch {
            function: native.name().to_string(),
            expected: native.return_words(),
            found: stack.offset().saturating_sub(base),
        });
    }
    Ok(())
}

/// Releases the returning frame's object arguments, moves the return value
/// down to the frame base and pops the frame. Temporaries left above the
/// arguments are an error.
fn ret(frames: &mut FrameStack, stack: &mut OperandStack) -> Result<Flow, VmError> {
    let Some(frame) = frames.current() else {
        return Ok(Flow::Halt);
    };
    let definition = frame.function.definition();
    let base = frame.base;
    let return_words = definition.return_words();

    // exactly the arguments and the return value may be left in the frame
    let locals_end = base + definition.argument_words();
    if stack.offset() < locals_end + return_words {
        return Err(VmError::StackUnderflow);
    }
    if stack.offset() > locals_end + return_words {
        return Err(VmError::ReturnCountMismatch {
            function: definition.name().to_string(),
            expected: return_words,
            found: stack.offset() - locals_end,
        });
    }
    let result = locals_end;

    if log_enabled!(Level::Debug) {
        let value = match definition.return_type() {
            Some(ty) => stack.describe_at(result, ty),
            None => "void".to_string(),
        };
        debug!("exit {} -> {value}", definition.name());
    }

    for (slot, ty) in definition.argument_slots() {
        if ty.is_reference() {
            let handle = stack.read_handle_at(base + slot)?;
            stack.release_handle(handle)?;
        }
    }
    stack.move_down(result, base, return_words);
    stack.set_offset(base + return_words);

    Ok(if frames.pop() {
        Flow::Continue
    } else {
        Flow::Halt
    })
}

fn describe_arguments(
    stack: &OperandStack,
    base: usize,
    definition: &FunctionDefinition,
) -> String {
    let values: Vec<_> = definition
        .argument_slots()
        .map(|(slot, ty)| stack.describe_at(base + slot, ty))
        .collect();
    values.join(", ")
}

fn report(frames: &FrameStack, ip: usize, err: VmError) -> VmError {
    if let Some(frame) = frames.current() {
        let function = frame.function.name();
        match frame.function.chunk().line_for(ip) {
            Some(line) => debug!("{err} in {function} at {ip:04} (line {line})"),
            None => debug!("{err} in {function} at {ip:04}"),
        }
    }
    err
}
