use serde::Serialize;
use stack_vm::asm;
use stack_vm::config::VmConfig;
use stack_vm::vm::VM;
use std::io;
use std::time::Instant;

const ITERATIONS: usize = 100_000;
const RUNS: usize = 5;

#[derive(Serialize)]
struct BenchmarkResult {
    name: String,
    words: usize,
    best_secs: f64,
    mean_secs: f64,
}

#[derive(Serialize)]
struct BenchmarkOutput {
    iterations: usize,
    runs: usize,
    results: Vec<BenchmarkResult>,
}

/// Push a zero sentinel and `n` counters, then loop over `body` once per
/// counter until JZ pops the sentinel.
fn drain_loop(n: usize, body: &str, subroutines: &str) -> String {
    let mut source = String::from("PUSH 0\n");
    for _ in 0..n {
        source.push_str("PUSH 1\n");
    }
    source.push_str("loop:\nJZ done\n");
    source.push_str(body);
    source.push_str("PUSH loop\nJMP\ndone:\nHALT\n");
    source.push_str(subroutines);
    source
}

fn programs() -> Vec<(&'static str, String)> {
    vec![
        ("empty_loop", drain_loop(ITERATIONS, "", "")),
        ("print_loop", drain_loop(ITERATIONS, "PUSH '.'\nPRINT\n", "")),
        (
            "add_loop",
            drain_loop(ITERATIONS, "PUSH 20\nPUSH 22\nADD\nPOP\n", ""),
        ),
        (
            "call_loop",
            drain_loop(
                ITERATIONS,
                "CALL work\n",
                "work:\nPUSH 1\nPUSH 2\nADD\nPOP\nRET\n",
            ),
        ),
    ]
}

fn time_program(name: &str, source: &str) -> Result<BenchmarkResult, String> {
    let words = asm::assemble(source).map_err(|e| format!("{}: {}", name, e))?;
    let config = VmConfig {
        stack_size: ITERATIONS + 8,
        ..VmConfig::default()
    };

    let mut samples = Vec::with_capacity(RUNS);
    for _ in 0..RUNS {
        let mut vm = VM::new_with_config(config, Box::new(io::sink()))
            .map_err(|e| format!("{}: {}", name, e))?;
        vm.load_program(&words)
            .map_err(|e| format!("{}: {}", name, e))?;

        let start = Instant::now();
        vm.run().map_err(|e| format!("{}: {}", name, e))?;
        samples.push(start.elapsed().as_secs_f64());
    }

    let best_secs = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let mean_secs = samples.iter().sum::<f64>() / samples.len() as f64;
    eprintln!("{}: best {:.6}s, mean {:.6}s", name, best_secs, mean_secs);

    Ok(BenchmarkResult {
        name: name.to_string(),
        words: words.len(),
        best_secs,
        mean_secs,
    })
}

fn main() {
    let mut results = Vec::new();
    for (name, source) in programs() {
        match time_program(name, &source) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("benchmark failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let output = BenchmarkOutput {
        iterations: ITERATIONS,
        runs: RUNS,
        results,
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("failed to serialize results: {}", e);
            std::process::exit(1);
        }
    }
}
