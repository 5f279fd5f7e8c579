use std::fs;
use std::path::PathBuf;

use arcbreaker::{convert_file, read_config, Config, Error, LineError};
use indicatif::ProgressBar;
use tempfile::TempDir;

fn write_program(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn coordinates(line: &str) -> (f64, f64, f64) {
    let mut values = [0.0; 3];
    for word in line.split_whitespace().skip(1) {
        let value: f64 = word[1..].parse().unwrap();
        match &word[..1] {
            "X" => values[0] = value,
            "Y" => values[1] = value,
            "Z" => values[2] = value,
            _ => panic!("unexpected word {}", word),
        }
    }
    (values[0], values[1], values[2])
}

#[test]
fn test_semicircle_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_program(&dir, "semicircle.ngc", "G02 X10.000 Y0.000 I5.000 J0.000\n");
    let config = Config::for_input(&input);

    let stats = convert_file(&config, &ProgressBar::hidden()).unwrap();
    assert_eq!(stats.arcs_expanded, 1);
    assert_eq!(stats.segments_emitted, 316);

    let output = fs::read_to_string(dir.path().join("semicircle_arcbreaker.ngc")).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "(Processed with ArcBreaker)");
    assert_eq!(lines.len(), 1 + 316);
    assert_eq!(lines[1], "G1 X0.000 Y0.000 Z0.000");
    assert_eq!(lines[316], "G1 X10.000 Y0.000 Z0.000");

    // Every point lies on the circle and steps are no longer than the tolerance
    let points: Vec<(f64, f64, f64)> = lines[1..].iter().map(|l| coordinates(l)).collect();
    for (x, y, _) in &points {
        let r = ((x - 5.0).powi(2) + y.powi(2)).sqrt();
        assert!((r - 5.0).abs() < 1e-3);
    }
    for pair in points.windows(2) {
        let step = ((pair[1].0 - pair[0].0).powi(2) + (pair[1].1 - pair[0].1).powi(2)).sqrt();
        assert!(step <= 0.05 + 1e-3);
    }
}

#[test]
fn test_mixed_program_keeps_other_lines() {
    let dir = TempDir::new().unwrap();
    let program = "\
(pcb2gcode milldrill)
G21
G90
G00 Z2.000
G00 X5.000 Y0.000
G01 Z-0.100 F100
G02 X5.000 Y0.000 I-5.000 J0.000 Z-0.200
G00 Z2.000
M5
";
    let input = write_program(&dir, "milldrill.ngc", program);
    let output_path = dir.path().join("out.ngc");
    let config = Config {
        output: Some(output_path.clone()),
        tolerance: 0.5,
        ..Config::for_input(&input)
    };

    convert_file(&config, &ProgressBar::hidden()).unwrap();
    let output = fs::read_to_string(&output_path).unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(&lines[1..7], &program.lines().take(6).collect::<Vec<_>>()[..]);
    assert_eq!(&lines[lines.len() - 2..], &["G00 Z2.000", "M5"]);

    // Full circle of radius 5 at a 0.5 step: 63 steps, 64 points
    let arc_lines = &lines[7..lines.len() - 2];
    assert_eq!(arc_lines.len(), 64);
    assert_eq!(arc_lines[0], "G1 X5.000 Y0.000 Z-0.100");
    assert_eq!(arc_lines[63], "G1 X5.000 Y0.000 Z-0.200");

    let depths: Vec<f64> = arc_lines.iter().map(|l| coordinates(l).2).collect();
    assert!(depths.windows(2).all(|d| d[1] <= d[0]));
}

#[test]
fn test_malformed_arc_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let input = write_program(&dir, "broken.ngc", "G21\nG0 X1 Y1\nG02 X10.000 Y0.000 I5.000\nM5\n");
    let config = Config::for_input(&input);

    let err = convert_file(&config, &ProgressBar::hidden()).unwrap_err();
    assert!(matches!(
        err,
        Error::Line { line: 3, source: LineError::MalformedArc { field: 'J' } }
    ));
    assert!(!config.output_path().exists());

    // Only the input is left in the directory
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_failed_run_keeps_previous_output() {
    let dir = TempDir::new().unwrap();
    let input = write_program(&dir, "program.ngc", "G2 X1 Y1 I0 J0\n");
    let output_path = dir.path().join("program_arcbreaker.ngc");
    fs::write(&output_path, "previous\n").unwrap();

    let err = convert_file(&Config::for_input(&input), &ProgressBar::hidden()).unwrap_err();
    assert!(matches!(err, Error::Line { line: 1, source: LineError::DegenerateArc }));
    assert_eq!(fs::read_to_string(&output_path).unwrap(), "previous\n");
}

#[test]
fn test_output_must_differ_from_input() {
    let dir = TempDir::new().unwrap();
    let input = write_program(&dir, "same.ngc", "G1 X1\n");
    let config = Config {
        output: Some(input.clone()),
        ..Config::for_input(&input)
    };
    assert!(matches!(
        convert_file(&config, &ProgressBar::hidden()),
        Err(Error::Config(_))
    ));
    assert_eq!(fs::read_to_string(&input).unwrap(), "G1 X1\n");
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_input(dir.path().join("nothing.ngc"));
    assert!(matches!(
        convert_file(&config, &ProgressBar::hidden()),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_config_file_drives_conversion() {
    let dir = TempDir::new().unwrap();
    write_program(&dir, "inches.ngc", "G20\nG04 P0\nG3 X1 Y0 I0.5 J0\n");
    let config_path = write_program(
        &dir,
        "arcbreaker.json",
        r#"{
            "input": "inches.ngc",
            "output": "mm.ngc",
            "tolerance": 1.0,
            "header": "",
            "counter_clockwise": "expand",
            "to_millimeters": true,
            "drop_dwell": true
        }"#,
    );

    let config = read_config(&config_path).unwrap();
    assert_eq!(config.input, dir.path().join("inches.ngc"));

    let stats = convert_file(&config, &ProgressBar::hidden()).unwrap();
    assert_eq!(stats.lines_dropped, 1);
    assert_eq!(stats.arcs_expanded, 1);

    let output = fs::read_to_string(dir.path().join("mm.ngc")).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "G21");
    assert_eq!(lines[1], "G1 X0.000 Y0.000 Z0.000");
    assert_eq!(*lines.last().unwrap(), "G1 X25.400 Y0.000 Z0.000");

    // Counter-clockwise from (0,0) around (12.7,0) dips below the X axis
    let (_, y, _) = coordinates(lines[lines.len() / 2]);
    assert!(y < -12.0);
}

#[test]
fn test_config_errors() {
    let dir = TempDir::new().unwrap();
    let no_input = write_program(&dir, "empty.json", r#"{ "tolerance": 0.1 }"#);
    assert!(matches!(read_config(&no_input), Err(Error::Config(_))));

    let missing = write_program(&dir, "missing.json", r#"{ "input": "nope.ngc" }"#);
    assert!(matches!(read_config(&missing), Err(Error::Config(_))));

    let invalid = write_program(&dir, "invalid.json", "{ input: ");
    assert!(matches!(read_config(&invalid), Err(Error::Json(_))));

    write_program(&dir, "ok.ngc", "G1 X1\n");
    let bad_tolerance = write_program(&dir, "tolerance.json", r#"{ "input": "ok.ngc", "tolerance": 0 }"#);
    assert!(matches!(read_config(&bad_tolerance), Err(Error::Config(_))));
}
