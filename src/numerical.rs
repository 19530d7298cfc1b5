/// # Richardson extrapolation
/// derivative of a function of one variable from central differences refined by Richardson extrapolation
/// Example#1
/// ```
///    use RustedRichardson::numerical::richardson::differentiate;
///    use RustedRichardson::symbolic::symbolic_lambdify::compile;
///    let f = compile("sin(x) * cos(x) * x**2").unwrap();
///    let result = differentiate(&f, 2.0, 0.01, 1e-6, 20).unwrap();
///    println!("derivative = {}, converged on level {} \n", result.estimate, result.iterations);
///    println!("{}", result.table);
///  ```
/// Example#2
/// ```
///    // or the solver struct, which keeps the parameters and installs a logger
///    use RustedRichardson::numerical::richardson::RichardsonDerivative;
///    use RustedRichardson::symbolic::symbolic_lambdify::compile;
///    let f = compile("exp(x)").unwrap();
///    let mut solver = RichardsonDerivative::new();
///    solver.set_problem(0.1, 1e-10, 20);
///    solver.set_loglevel(Some("none".to_string()));
///    let _ = solver.solve(&f, 0.0);
///    println!("result = {:?} \n", solver.get_result().unwrap());
/// ```
pub mod richardson;
/// function and derivative sampled on [x - 2, x + 2], in parallel
pub mod derivative_curve;
mod richardson_tests;
