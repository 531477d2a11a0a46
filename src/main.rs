//! CLI for validating an attachment batch stored in a directory.
//!
//! Every regular file in the directory is one uploaded part; the manifest is
//! `metadata.json`. The prepared summary (or the rejection report) is printed
//! to stdout as JSON, progress goes to stderr.

use std::sync::Arc;
use std::{env, process};

use tracing_subscriber::EnvFilter;
use vedlegg_ingest::{
    read_batch_dir, AttachmentPipeline, HttpScannerConfig, HttpVirusScanner, IngestConfig, NoopScanner, Rejection,
    VirusScanner,
};

struct Options {
    batch_dir: String,
    scanner_url: Option<String>,
    max_file_size: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("vedlegg-ingest");

    if args.len() < 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(program);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let options = match parse_args(&args[1..]) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("❌ {message}");
            print_usage(program);
            process::exit(2);
        }
    };

    process::exit(run(options).await);
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut batch_dir = None;
    let mut scanner_url = None;
    let mut max_file_size = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--scanner-url" => {
                let url = iter.next().ok_or("--scanner-url needs a value")?;
                scanner_url = Some(url.clone());
            }
            "--max-file-size" => {
                let value = iter.next().ok_or("--max-file-size needs a value")?;
                let bytes = value
                    .parse::<u64>()
                    .map_err(|e| format!("invalid --max-file-size '{value}': {e}"))?;
                max_file_size = Some(bytes);
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{flag}'")),
            path if batch_dir.is_none() => batch_dir = Some(path.to_string()),
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }

    Ok(Options {
        batch_dir: batch_dir.ok_or("missing <batch_dir>")?,
        scanner_url,
        max_file_size,
    })
}

fn print_usage(program_name: &str) {
    println!("📎 vedlegg-ingest - attachment batch validation");
    println!();
    println!("USAGE:");
    println!("    {program_name} <batch_dir> [options]");
    println!();
    println!("ARGUMENTS:");
    println!("    <batch_dir>              Directory holding metadata.json and the uploaded files");
    println!();
    println!("OPTIONS:");
    println!("    --scanner-url <url>      Virus scan endpoint (scanning is disabled without it)");
    println!("    --max-file-size <bytes>  Per-file size limit (default: 10 MiB)");
    println!("    -h, --help               Show this help message");
    println!();
    println!("Exit status is 0 when the batch is accepted, 1 when it is rejected.");
}

async fn run(options: Options) -> i32 {
    let mut config = IngestConfig::default();
    if let Some(max) = options.max_file_size {
        config.max_file_size = max;
    }

    let scanner: Arc<dyn VirusScanner> = match options.scanner_url {
        Some(url) => match HttpVirusScanner::new(HttpScannerConfig::new(url)) {
            Ok(scanner) => Arc::new(scanner),
            Err(e) => {
                eprintln!("❌ {e}");
                return 1;
            }
        },
        None => Arc::new(NoopScanner),
    };

    eprintln!("🔍 Reading batch: {}", options.batch_dir);
    let parts = match read_batch_dir(&options.batch_dir) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("❌ {e}");
            return 1;
        }
    };

    let pipeline = AttachmentPipeline::with_config(config, scanner);
    match pipeline.process(parts).await {
        Ok(prepared) => {
            eprintln!(
                "✅ Accepted {} file(s), {}",
                prepared.files().count(),
                format_bytes(prepared.total_size())
            );
            print_json(&prepared)
        }
        Err(Rejection::Fatal(e)) => {
            eprintln!("❌ Batch refused: {e}");
            print_json(&serde_json::json!({ "error": e.to_string() }));
            1
        }
        Err(Rejection::Invalid(report)) => {
            for (group, file) in report.rejected_files() {
                eprintln!("❌ {} / {}: {}", group.kind, file.filename, file.outcome);
            }
            print_json(&report);
            1
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("❌ Could not serialize output: {e}");
            1
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
