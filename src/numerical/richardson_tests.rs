#[cfg(test)]
mod tests {
    use crate::numerical::richardson::{
        ClosureFunction, DEFAULT_MAX_ITERATIONS, DEFAULT_STEP, DEFAULT_TOLERANCE,
        RichardsonError, differentiate,
    };
    use crate::symbolic::symbolic_lambdify::compile;
    use approx::assert_relative_eq;
    use rayon::prelude::*;
    use std::f64::consts::PI;

    #[test]
    fn test_powers_of_x() {
        for n in 1..=4 {
            let f = compile(&format!("x**{}", n)).unwrap();
            for &x in &[0.0, 1.0, -2.0, 3.5] {
                let result = differentiate(&f, x, DEFAULT_STEP, DEFAULT_TOLERANCE, DEFAULT_MAX_ITERATIONS)
                    .unwrap();
                let exact = n as f64 * f64::powi(x, n - 1);
                assert!(
                    (result.estimate - exact).abs() < DEFAULT_TOLERANCE,
                    "d/dx x^{} at {}: got {}, expected {}",
                    n,
                    x,
                    result.estimate,
                    exact
                );
            }
        }
    }

    #[test]
    fn test_sine() {
        let f = compile("sin(x)").unwrap();
        let at_zero = differentiate(&f, 0.0, 0.01, 1e-6, 20).unwrap();
        assert_relative_eq!(at_zero.estimate, 1.0, epsilon = 1e-6);
        let at_half_pi = differentiate(&f, PI / 2.0, 0.01, 1e-6, 20).unwrap();
        assert_relative_eq!(at_half_pi.estimate, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_product_scenario() {
        let f = compile("sin(x) * cos(x) * x**2").unwrap();
        let x: f64 = 2.0;
        let result = differentiate(&f, x, 0.01, 1e-6, 20).unwrap();
        let exact = 2.0 * x * x.sin() * x.cos() + x * x * (x.cos().powi(2) - x.sin().powi(2));
        assert_relative_eq!(result.estimate, exact, epsilon = 1e-6);
    }

    #[test]
    fn test_namespaced_expression() {
        let f = compile("np.exp(x) * math.cos(x)").unwrap();
        let x: f64 = 0.3;
        let result = differentiate(&f, x, 0.1, 1e-10, 20).unwrap();
        assert_relative_eq!(result.estimate, x.exp() * (x.cos() - x.sin()), epsilon = 1e-9);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let f = compile("exp(x) / (1 + x**2)").unwrap();
        let first = differentiate(&f, 0.7, 0.05, 1e-9, 20).unwrap();
        let second = differentiate(&f, 0.7, 0.05, 1e-9, 20).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.estimate.to_bits(), second.estimate.to_bits());
    }

    #[test]
    fn test_parallel_calls_match_sequential() {
        let f = compile("tan(x) + x**3").unwrap();
        let points: Vec<f64> = (0..16).map(|i| -0.75 + 0.1 * i as f64).collect();
        let sequential: Vec<f64> = points
            .iter()
            .map(|&x| differentiate(&f, x, 0.01, 1e-8, 20).unwrap().estimate)
            .collect();
        let parallel: Vec<f64> = points
            .par_iter()
            .map(|&x| differentiate(&f, x, 0.01, 1e-8, 20).unwrap().estimate)
            .collect();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_table_shape() {
        let f = ClosureFunction::new(|x: f64| x.sin(), "sin");
        let result = differentiate(&f, 1.0, 0.5, 1e-10, 20).unwrap();
        let table = &result.table;
        assert_eq!(table.levels(), result.iterations + 1);
        assert_eq!(result.estimate, table.get(result.iterations, result.iterations).unwrap());
        for r in 0..table.levels() {
            assert_eq!(table.row(r).unwrap().len(), r + 1);
            assert!(table.get(r, r + 1).is_none());
        }
        assert!(table.row(table.levels()).is_none());

        let exact = 1f64.cos();
        let deviations: Vec<f64> = table.diagonal().iter().map(|d| (d - exact).abs()).collect();
        for pair in deviations.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-14, "{:?}", deviations);
        }
    }

    #[test]
    fn test_steps_are_halved() {
        let f = ClosureFunction::new(|x: f64| x.exp(), "exp");
        let result = differentiate(&f, 0.0, 0.8, 1e-12, 20).unwrap();
        let steps = result.table.steps();
        assert_eq!(steps[0], 0.8);
        for pair in steps.windows(2) {
            assert_eq!(pair[1] * 2.0, pair[0]);
        }
    }

    #[test]
    fn test_tiny_tolerance_does_not_converge() {
        let f = compile("exp(x)").unwrap();
        let err = differentiate(&f, 0.0, 1.0, 1e-300, 5).unwrap_err();
        match &err {
            RichardsonError::NotConverged {
                estimate,
                table,
                iterations,
            } => {
                assert_eq!(*iterations, 4);
                assert_eq!(table.levels(), iterations + 1);
                assert_eq!(*estimate, table.get(4, 4).unwrap());
                // unconverged, yet already a good estimate
                assert_relative_eq!(*estimate, 1.0, epsilon = 1e-8);
            }
            other => panic!("expected NotConverged, got {:?}", other),
        }
        assert!(err.best_effort().is_some());
        assert!(err.to_string().contains("Desired accuracy not achieved after 5 levels"));
    }

    #[test]
    fn test_log_at_zero_is_a_domain_error() {
        let f = compile("log(x)").unwrap();
        let err = differentiate(&f, 0.0, DEFAULT_STEP, DEFAULT_TOLERANCE, DEFAULT_MAX_ITERATIONS)
            .unwrap_err();
        match &err {
            RichardsonError::Domain(cause) => {
                assert!(cause.is_domain_error());
                assert_eq!(cause.input(), "log(x)");
            }
            other => panic!("expected Domain, got {:?}", other),
        }
        assert!(err.best_effort().is_none());
        assert!(err.to_string().contains("log(x)"));
    }

    #[test]
    fn test_division_by_zero_inside_expression() {
        let f = compile("1 / (x - 0.01)").unwrap();
        let err = differentiate(&f, 0.0, 0.01, 1e-6, 20).unwrap_err();
        assert!(matches!(err, RichardsonError::Domain(_)));
    }

    #[test]
    fn test_infinite_values_run_to_exhaustion() {
        // exp overflows on both sides of the point, inf - inf is NaN
        let f = compile("exp(x)").unwrap();
        let err = differentiate(&f, 1000.0, 0.01, 1e-6, 8).unwrap_err();
        match err {
            RichardsonError::NotConverged { estimate, iterations, .. } => {
                assert!(estimate.is_nan());
                assert_eq!(iterations, 7);
            }
            other => panic!("expected NotConverged, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_expressions_never_reach_the_engine() {
        for source in ["import os; os.system('ls')", "x + unknown_name", "", "sin(x"] {
            let err = compile(source).unwrap_err();
            assert!(err.is_parse_error(), "{}", source);
        }
    }
}
