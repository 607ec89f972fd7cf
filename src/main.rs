//! # Inkline CLI
//!
//! Usage:
//!   inkline input.txt -o output.pdf
//!   echo 'Some <b>bold</b> text' | inkline --align justify -o output.pdf
//!   inkline input.txt --options options.json --styles tags.json
//!
//! Flags:
//!   -o <path>          output file (default output.pdf)
//!   --align <mode>     left, right, center or justify
//!   --optimal          minimum-raggedness line breaking
//!   --columns <n>      number of columns
//!   --options <path>   FormatOptions as JSON
//!   --styles <path>    extra tag styles as JSON, merged over the defaults

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use inkline::text::Algorithm;
use inkline::{Canvas, FontContext, FormatOptions, Formatter, InklineError, StyleRegistry};

fn main() {
    let args: Vec<String> = env::args().collect();

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    };
    let input = match input {
        Ok(text) => text,
        Err(e) => {
            eprintln!("✗ Failed to read input: {}", e);
            process::exit(1);
        }
    };

    let output_path = flag_value(&args, "-o").unwrap_or_else(|| "output.pdf".to_string());

    match render(&input, &args) {
        Ok(pdf_bytes) => match fs::write(&output_path, &pdf_bytes) {
            Ok(()) => eprintln!("✓ Written {} bytes to {}", pdf_bytes.len(), output_path),
            Err(e) => {
                eprintln!("✗ Failed to write {}: {}", output_path, e);
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("✗ Layout failed: {}", e);
            process::exit(1);
        }
    }
}

fn render(input: &str, args: &[String]) -> Result<Vec<u8>, InklineError> {
    let mut options = match flag_value(args, "--options") {
        Some(path) => FormatOptions::from_json(&read_config(&path)?)?,
        None => FormatOptions::default(),
    };
    if let Some(align) = flag_value(args, "--align") {
        options.align = align.parse()?;
    }
    if args.iter().any(|a| a == "--optimal") {
        options.algorithm = Algorithm::Optimal;
    }
    if let Some(columns) = flag_value(args, "--columns") {
        options.columns = columns
            .parse()
            .map_err(|_| InklineError::Usage(format!("--columns expects a number, got {columns:?}")))?;
    }

    let mut registry = StyleRegistry::default();
    if let Some(path) = flag_value(args, "--styles") {
        registry.merge(StyleRegistry::from_json(&read_config(&path)?)?);
    }

    let fonts = FontContext::new();
    let mut canvas = Canvas::default();
    let mut formatter = Formatter::new(input, options, &fonts, &registry)?;
    if formatter.options().at.is_some() {
        let width = inkline::PageSink::bounds(&canvas).width;
        formatter.draw_at(width, &mut canvas)?;
    } else {
        formatter.paginate(&mut canvas)?;
    }
    Ok(canvas.to_pdf())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn read_config(path: &str) -> Result<String, InklineError> {
    fs::read_to_string(path).map_err(|e| InklineError::Usage(format!("cannot read {path}: {e}")))
}
