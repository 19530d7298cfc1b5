use crate::numerical::derivative_curve::CurvePoint;
use crate::numerical::richardson::RichardsonTable;
use csv::Writer;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::fs::File;
use std::io::{self, Write};

/// maps "debug", "info", "warn", "error", "off"/"none" onto a level filter
pub fn level_from_str(loglevel: &str) -> Result<LevelFilter, String> {
    match loglevel.trim().to_lowercase().as_str() {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" | "none" => Ok(LevelFilter::Off),
        other => Err(format!(
            "unknown log level '{}', expected debug, info, warn, error, off or none",
            other
        )),
    }
}

/// Installs the terminal logger. Only the first call in a process succeeds, later calls
/// return false and leave the installed logger untouched.
pub fn init_term_logger(level: LevelFilter) -> bool {
    CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .is_ok()
}

/// writes the table as tab-separated text: step, then the estimates of the row
pub fn save_table_to_file(table: &RichardsonTable, filename: &str) -> io::Result<()> {
    let mut file = File::create(filename)?;
    let mut headers = vec!["step".to_string()];
    headers.extend((0..table.levels()).map(|k| format!("order_{}", 2 * k + 2)));
    writeln!(file, "{}", headers.join("\t"))?;
    for (step, row) in table.steps().iter().zip(table.rows()) {
        let mut row_data = vec![step.to_string()];
        row_data.extend(row.iter().map(|val| val.to_string()));
        writeln!(file, "{}", row_data.join("\t"))?;
    }
    Ok(())
}

/// Writes the curve as CSV with columns `x`, `f(x)`, `df/dx`. Points where the function or
/// its derivative failed get an empty cell.
pub fn save_curve_to_csv(curve: &[CurvePoint], filename: &str) -> Result<(), csv::Error> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);
    writer.write_record(["x", "f(x)", "df/dx"])?;
    for point in curve {
        let value = point.value.as_ref().map(|v| v.to_string()).unwrap_or_default();
        let derivative = point
            .derivative
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        writer.write_record([point.x.to_string(), value, derivative])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::derivative_curve::derivative_curve;
    use crate::numerical::richardson::{ClosureFunction, differentiate};
    use crate::symbolic::symbolic_lambdify::compile;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rusted_richardson_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("debug"), Ok(LevelFilter::Debug));
        assert_eq!(level_from_str(" Info "), Ok(LevelFilter::Info));
        assert_eq!(level_from_str("warn"), Ok(LevelFilter::Warn));
        assert_eq!(level_from_str("error"), Ok(LevelFilter::Error));
        assert_eq!(level_from_str("none"), Ok(LevelFilter::Off));
        assert_eq!(level_from_str("off"), Ok(LevelFilter::Off));
        assert!(level_from_str("verbose").unwrap_err().contains("verbose"));
    }

    #[test]
    fn test_save_table_to_file() {
        let f = ClosureFunction::new(|x: f64| x.exp(), "exp");
        let result = differentiate(&f, 0.0, 0.1, 1e-10, 20).unwrap();
        let path = temp_path("table.txt");
        save_table_to_file(&result.table, path.to_str().unwrap()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), result.table.levels() + 1);
        assert!(lines[0].starts_with("step\torder_2"));
        // row i has the step and i + 1 estimates
        for (i, line) in lines[1..].iter().enumerate() {
            assert_eq!(line.split('\t').count(), i + 2);
        }
    }

    #[test]
    fn test_save_curve_to_csv() {
        let f = compile("log(x)").unwrap();
        let curve = derivative_curve(&f, 0.0, 0.01, 1e-6, 20, 5).unwrap();
        let path = temp_path("curve.csv");
        save_curve_to_csv(&curve, path.to_str().unwrap()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["x", "f(x)", "df/dx"]);
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 5);
        // x = 0 lies outside the domain of log
        assert_eq!(&records[2][1], "");
        assert_eq!(&records[2][2], "");
        assert_eq!(&records[3][1], "0");
    }
}
