use std::path;
use std::process;
use std::sync::Mutex;
use std::time::Instant;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use line_sort::audit;
use line_sort::{Encoding, ExternalSorter, ExternalSorterBuilder, ParsedLine};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let input = path::Path::new(arg_parser.value_of("input").expect("value is required"));
    let output = path::Path::new(arg_parser.value_of("output").expect("value is required"));
    let encoding: Encoding = arg_parser.value_of_t_or_exit("encoding");
    let chunk_size = parse_bytesize(arg_parser.value_of("chunk_size").expect("value has default"));
    let buffer_size = parse_bytesize(arg_parser.value_of("buffer_size").expect("value has default"));
    let max_file_handles: usize = arg_parser.value_of_t_or_exit("max_file_handles");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));
    let verify = arg_parser.is_present("verify");

    log::info!("input file: {}", input.display());
    log::info!("output file: {}", output.display());
    log::info!("encoding: {}", encoding);
    log::info!("chunk size: {}", ByteSize::b(chunk_size));

    let started = Instant::now();
    let last_report = Mutex::new(Instant::now());

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_encoding(encoding)
        .with_chunk_size(chunk_size)
        .with_rw_buf_size(buffer_size as usize)
        .with_max_file_handles(max_file_handles)
        .with_progress(move |msg| match last_report.lock() {
            Ok(mut last_report) => {
                log::info!("{} [time: {} ms]", msg, last_report.elapsed().as_millis());
                *last_report = Instant::now();
            }
            Err(_) => log::info!("{}", msg),
        });

    if let Some(threads) = threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter: ExternalSorter<ParsedLine> = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let stats = match sorter.sort_file(input, output) {
        Ok(stats) => stats,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };

    log::info!(
        "file sorted: {} records written, {} malformed lines skipped, {} chunks, {} merge passes",
        stats.records_written,
        stats.lines_dropped,
        stats.chunks,
        stats.merge_passes
    );
    log::info!("total execution time: {:.2} seconds", started.elapsed().as_secs_f64());

    if verify && !verify_output(input, output, encoding) {
        process::exit(1);
    }
}

fn verify_output(input: &path::Path, output: &path::Path, encoding: Encoding) -> bool {
    let report = match audit::verify_against(input, output, encoding, |a: &ParsedLine, b: &ParsedLine| {
        a.text == b.text
    }) {
        Ok(report) => report,
        Err(err) => {
            log::error!("sorted file verification error: {}", err);
            return false;
        }
    };

    log::info!(
        "input lines: {}, output lines: {}",
        report.original_lines.unwrap_or_default(),
        report.lines
    );
    if report.found_duplicate_text {
        log::info!("records with the same text found, numeric order checked");
    }

    if let Some(violation) = &report.violation {
        log::error!(
            "output file is not sorted at line {}: previous: {}, current: {}",
            violation.line_number,
            violation.previous.as_deref().unwrap_or("n/a"),
            violation.current
        );
        return false;
    }
    if !report.line_counts_match() {
        return false;
    }

    log::info!("output file is sorted");
    return true;
}

fn parse_bytesize(value: &str) -> u64 {
    value.parse::<ByteSize>().expect("value is pre-validated").as_u64()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_bytesize(value: &str) -> Result<(), String> {
    match value.parse::<ByteSize>() {
        Ok(size) if size.as_u64() > 0 => Ok(()),
        Ok(_) => Err("size must be positive".to_string()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-sort")
        .about("external sorter for `<number>. <text>` line files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true)
                .validator(|v| match path::Path::new(v).is_file() {
                    true => Ok(()),
                    false => Err(format!("input file '{}' does not exist", v)),
                }),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true)
                .validator(|v| match path::Path::new(v).parent() {
                    Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                        Err(format!("output directory '{}' does not exist", dir.display()))
                    }
                    _ => Ok(()),
                }),
        )
        .arg(
            clap::Arg::new("encoding")
                .short('e')
                .long("encoding")
                .help("input and output files encoding (utf8, ascii, latin1, utf16, utf-16be, utf32, utf-32be)")
                .takes_value(true)
                .default_value("utf8")
                .validator(|v| v.parse::<Encoding>().map(|_| ())),
        )
        .arg(
            clap::Arg::new("chunk_size")
                .short('c')
                .long("chunk-size")
                .help("maximum chunk size")
                .takes_value(true)
                .default_value("512MiB")
                .validator(validate_bytesize),
        )
        .arg(
            clap::Arg::new("max_file_handles")
                .short('m')
                .long("max-file-handles")
                .help("maximum number of files merged at once")
                .takes_value(true)
                .default_value("512")
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 2 => Ok(()),
                    _ => Err(format!("expected a number not less than 2, got '{}'", v)),
                }),
        )
        .arg(
            clap::Arg::new("buffer_size")
                .short('b')
                .long("buffer-size")
                .help("file read/write buffer size")
                .takes_value(true)
                .default_value("4MiB")
                .validator(validate_bytesize),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel chunk sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("verify")
                .long("verify")
                .help("check the output file sort order after sorting"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
