#![allow(non_snake_case)]
use RustedRichardson::Utils::logger::{save_curve_to_csv, save_table_to_file};
use RustedRichardson::Utils::task_parser::DerivativeTask;
use RustedRichardson::numerical::derivative_curve::{CURVE_HALF_WIDTH, derivative_curve};
use RustedRichardson::numerical::richardson::{RichardsonDerivative, RichardsonError};
use RustedRichardson::symbolic::symbolic_lambdify::compile;
use std::env;
use std::error::Error;
use std::process;
use std::time::Instant;

// usage: RustedRichardson [task_file]
// without a task file the default task (sin(x) at x = 1.5) is computed
fn main() {
    let task = match env::args().nth(1) {
        Some(path) => match DerivativeTask::from_file(&path) {
            Ok(task) => task,
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        },
        None => DerivativeTask::default(),
    };
    if let Err(err) = run(&task) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(task: &DerivativeTask) -> Result<(), Box<dyn Error>> {
    let f = compile(&task.function)?;
    let mut solver = RichardsonDerivative::new();
    solver.set_problem(task.h, task.tolerance, task.max_iterations);
    solver.set_loglevel(task.loglevel.clone());

    let start = Instant::now();
    let table = match solver.solve(&f, task.x) {
        Ok(result) => {
            println!(
                "The derivative of the function at x={} is: {:.10}",
                task.x, result.estimate
            );
            println!("converged after {} refinements", result.iterations);
            result.table
        }
        Err(RichardsonError::NotConverged {
            estimate, table, ..
        }) => {
            println!("Warning: Desired accuracy not achieved, showing the last estimate");
            println!(
                "Best-effort derivative of the function at x={}: {:.10}",
                task.x, estimate
            );
            table
        }
        Err(err) => return Err(err.into()),
    };
    println!("{}", table);
    if let Some(path) = &task.table_output {
        save_table_to_file(&table, path)?;
        println!("table saved to {}", path);
    }

    let curve = derivative_curve(
        &f,
        task.x,
        task.h,
        task.tolerance,
        task.max_iterations,
        task.curve_points,
    )?;
    let failed = curve.iter().filter(|p| p.derivative.is_err()).count();
    println!(
        "derivative curve on [{}, {}]: {} points, {} without a converged derivative",
        task.x - CURVE_HALF_WIDTH,
        task.x + CURVE_HALF_WIDTH,
        curve.len(),
        failed
    );
    if let Some(path) = &task.curve_output {
        save_curve_to_csv(&curve, path)?;
        println!("curve saved to {}", path);
    }
    println!("elapsed time: {:?}", start.elapsed());
    Ok(())
}
