use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use log::info;
use slate::{
    BuiltInType, ChunkBuilder, Function, FunctionArgument, FunctionDefinition, VM, VMCreateInfo,
};

/// Runs `int Sum(int a, int b)` through the interpreter many times.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Calls per thread
    #[arg(short, long, default_value_t = 1_000_000)]
    iterations: u32,

    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    #[arg(short, long, default_value_t = 1)]
    a: i32,

    #[arg(short, long, default_value_t = 2)]
    b: i32,

    /// Operand stack size in words
    #[arg(long, default_value_t = 1024)]
    stack_depth: usize,

    #[arg(long, default_value_t = 512)]
    max_frames: usize,

    /// Print the compiled function before running it
    #[arg(long)]
    dump: bool,
}

fn compile_sum() -> Result<Function, Box<dyn Error>> {
    let definition = FunctionDefinition::new("Sum", Some(BuiltInType::Int), vec![
        FunctionArgument::new("a", BuiltInType::Int),
        FunctionArgument::new("b", BuiltInType::Int),
    ]);
    let local = |name: &str| -> Result<u8, Box<dyn Error>> {
        let index = definition
            .word_index_of(name)
            .ok_or_else(|| format!("no argument named {name}"))?;
        Ok(u8::try_from(index)?)
    };

    let mut b = ChunkBuilder::new();
    b.line(1);
    b.get_local(BuiltInType::Int, local("a")?)?;
    b.get_local(BuiltInType::Int, local("b")?)?;
    b.add(BuiltInType::Int)?;
    b.ret()?;

    Ok(Function::new(definition, b.finish()))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let vm = VM::new(VMCreateInfo {
        stack_depth: cli.stack_depth,
        max_frames: cli.max_frames,
        ..Default::default()
    });

    let sum = Arc::new(compile_sum()?);
    if cli.dump {
        println!("{sum}");
        print!("{}", sum.chunk());
    }
    let typed = sum.typed::<(i32, i32), i32>(&vm)?;

    info!("running {} x {} calls of {sum}", cli.threads, cli.iterations);
    let start = Instant::now();
    let results = thread::scope(|s| {
        let workers: Vec<_> = (0..cli.threads)
            .map(|_| {
                s.spawn(|| {
                    let mut last = 0;
                    for _ in 0..cli.iterations {
                        last = typed.call((cli.a, cli.b))?;
                    }
                    Ok::<i32, slate::VmError>(last)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().map_err(|_| "worker thread panicked"))
            .collect::<Vec<_>>()
    });
    let elapsed = start.elapsed();

    for result in results {
        let value = result??;
        println!("{} + {} = {value}", cli.a, cli.b);
    }

    let calls = u64::from(cli.iterations) * cli.threads as u64;
    println!("{calls} calls in {elapsed:?}");
    if calls > 0 {
        println!("{} ns per call", elapsed.as_nanos() / u128::from(calls));
    }
    println!("stack pool: {:?}", vm.stack_pool_stats());
    println!("frame pool: {:?}", vm.frame_pool_stats());
    Ok(())
}
