use calreport::engine::{format_abs_error, format_percent_error};
use calreport::loader::from_csv;
use calreport::measurement::{InstrumentConfiguration, SignalDomain};
use calreport::report::{CalibrationReport, measurement_headers, measurement_row, summarize};
use std::env;

fn usage(program: &str) {
    eprintln!("Usage: {} <mA|mV|ohm> <ue|no-ue> <readings.csv>", program);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cli");
    if args.len() != 4 {
        usage(program);
        return Ok(());
    }

    let Some(domain) = SignalDomain::from_label(&args[1]) else {
        eprintln!("Error: unknown signal domain '{}'", args[1]);
        usage(program);
        return Ok(());
    };

    let tracks_ue = match args[2].as_str() {
        "ue" => true,
        "no-ue" => false,
        other => {
            eprintln!("Error: expected 'ue' or 'no-ue', got '{}'", other);
            usage(program);
            return Ok(());
        }
    };

    let configuration = InstrumentConfiguration::new(domain, tracks_ue);
    let records = from_csv(&args[3], &configuration)?;

    let report = CalibrationReport {
        configuration,
        records,
        ..CalibrationReport::default()
    };

    let headers = measurement_headers(&configuration);
    let rows: Vec<Vec<String>> = report.records.iter().map(measurement_row).collect();

    // Column widths
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(c, h)| {
            rows.iter()
                .map(|r| r[c].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let print_row = |cells: &[String]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:>width$}", cell, width = width))
            .collect();
        println!("{}", line.join("  "));
    };

    print_row(&headers);
    for row in &rows {
        print_row(row);
    }

    let summary = summarize(&report);
    println!();
    println!("Rows: {}", summary.measurement_count);
    println!(
        "Max |error|: {} {}",
        format_abs_error(summary.max_abs_output_error),
        domain.unit()
    );
    println!(
        "Max |error %|: {}",
        format_percent_error(summary.max_abs_output_error_percent)
    );
    if let Some(ue) = summary.max_abs_engineering_unit_error {
        println!("Max |UE error|: {}", format_abs_error(ue));
    }

    Ok(())
}
