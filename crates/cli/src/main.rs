// Stream a delimited matrix through sharded Pearson accumulators and write the
// coefficient of every column pair. Memory stays bounded by one chunk of rows.

use clap::Parser;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use flate2::{
    read::{GzDecoder, MultiGzDecoder},
    write::GzEncoder,
    Compression,
};
use log::{error, info};
use num_traits::Float;
use std::{
    fmt::Display,
    fs::File,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
    time::{Duration, Instant},
};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tar::{Archive, Builder, Header};
use thiserror::Error;

use streamcorr::{
    parse::parse_row_into, pearson::par_accumulate_block, BlockView, CorrError,
    MulticolumnAccumulator,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Corr(#[from] CorrError),
    #[error("line {line}: {source}")]
    Record { line: u64, source: CorrError },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to set thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{0}")]
    Input(String),
}

#[derive(EnumString, EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
enum Precision {
    #[strum(to_string = "f32", serialize = "single")]
    F32,
    #[strum(to_string = "f64", serialize = "double")]
    F64,
}

/// Pearson correlation of every column pair of a delimited matrix, computed
/// in one streaming pass.
#[derive(Parser, Debug)]
#[command(name = "streamcorr", version, about)]
struct Args {
    /// Input file (.tsv/.csv, optionally .gz or .tar.gz) with a header row
    input: PathBuf,

    /// Number of worker threads (default: all available)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Rows parsed per chunk before it is fanned out to the workers
    #[arg(long, default_value_t = 4096)]
    chunk_rows: usize,

    /// Field delimiter
    #[arg(short, long, default_value_t = '\t')]
    delimiter: char,

    /// First column holds row labels and is skipped
    #[arg(long)]
    row_ids: bool,

    /// Accumulation precision: f32 or f64
    #[arg(long, default_value = "f64")]
    precision: Precision,

    /// Output archive (default: <input stem>_pearson_pairs.tar.gz)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report detailed timings
    #[arg(long)]
    time: bool,
}

#[derive(Debug)]
struct Accumulated<T> {
    names: Vec<String>,
    acc: MulticolumnAccumulator<T>,
    chunks: usize,
}

fn delimiter_byte(delimiter: char) -> Result<u8, CliError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CliError::Input(format!("Delimiter '{}' is not ASCII", delimiter)))
}

/// Hands the decoded input stream to `f`, looking through gzip and tar.gz
/// wrappers the same way for every precision.
fn with_input<F, R>(path: &Path, f: F) -> Result<R, CliError>
where
    F: FnOnce(&mut dyn Read) -> Result<R, CliError>,
{
    let name = path.to_string_lossy();
    let file = File::open(path)?;
    if name.ends_with(".tar.gz") {
        let mut archive = Archive::new(GzDecoder::new(file));
        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.header().entry_type().is_file() {
                return f(&mut entry);
            }
        }
        Err(CliError::Input(
            "No readable file found in tar archive".to_string(),
        ))
    } else if name.ends_with(".gz") {
        f(&mut MultiGzDecoder::new(file))
    } else {
        let mut file = file;
        f(&mut file)
    }
}

fn flush_chunk<T>(
    total: &mut MulticolumnAccumulator<T>,
    buf: &[T],
    cols: usize,
) -> Result<(), CliError>
where
    T: Float + Send + Sync,
{
    let block = BlockView::row_major(buf, buf.len() / cols, cols)?;
    let chunk = par_accumulate_block(&block, 0)?;
    total.merge_into(&chunk)?;
    Ok(())
}

fn accumulate_stream<T>(
    reader: &mut dyn Read,
    delimiter: u8,
    row_ids: bool,
    chunk_rows: usize,
) -> Result<Accumulated<T>, CliError>
where
    T: Float + FromStr + Send + Sync,
{
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let skip = usize::from(row_ids);
    let names: Vec<String> = rdr
        .headers()?
        .iter()
        .skip(skip)
        .map(|s| s.trim().to_string())
        .collect();
    // At least two value columns are needed for a single pair
    if names.len() < 2 {
        return Err(CliError::Input(
            "Input file must contain at least two value columns for correlation analysis"
                .to_string(),
        ));
    }

    let cols = names.len();
    let chunk_rows = chunk_rows.max(1);
    let chunk_len = chunk_rows.checked_mul(cols).ok_or_else(|| {
        CliError::Input(format!(
            "Chunk of {} rows x {} columns does not fit in memory",
            chunk_rows, cols
        ))
    })?;
    let mut acc = MulticolumnAccumulator::new(cols)?;
    let mut buf: Vec<T> = Vec::new();
    buf.try_reserve_exact(chunk_len).map_err(|e| {
        CliError::Input(format!(
            "Cannot buffer {} rows x {} columns: {}",
            chunk_rows, cols, e
        ))
    })?;
    let mut record = StringRecord::new();
    let mut chunks = 0;

    while rdr.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line());
        parse_row_into(&mut buf, record.iter().skip(skip), cols)
            .map_err(|source| CliError::Record { line, source })?;
        if buf.len() == chunk_len {
            flush_chunk(&mut acc, &buf, cols)?;
            buf.clear();
            chunks += 1;
            info!("Accumulated {} rows.", acc.rows());
        }
    }
    if !buf.is_empty() {
        flush_chunk(&mut acc, &buf, cols)?;
        chunks += 1;
    }

    Ok(Accumulated { names, acc, chunks })
}

fn pairs_tsv<T: Float + Display>(data: &Accumulated<T>) -> Result<Vec<u8>, CliError> {
    let mut csv_buf = Vec::<u8>::new();
    {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(&mut csv_buf);
        wtr.write_record(["column_a", "column_b", "pearson"])?;
        for ((i, j), r) in data.acc.results().iter() {
            wtr.write_record([
                data.names[i].as_str(),
                data.names[j].as_str(),
                r.to_string().as_str(),
            ])?;
        }
        wtr.flush()?;
    }
    Ok(csv_buf)
}

/// Input file name without `.gz` / `.tar.gz` and the table extension.
fn input_basename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let stem = stem.strip_suffix(".tar").unwrap_or(stem);
    Path::new(stem)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stem)
        .to_string()
}

fn write_archive(tar_gz_path: &Path, csv_buf: Vec<u8>) -> Result<(), CliError> {
    let base = input_basename(tar_gz_path);
    let tar_gz_file = File::create(tar_gz_path)?;
    let enc = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(enc);

    let mut header = Header::new_gnu();
    header.set_size(csv_buf.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let csv_name = format!("{}.tsv", base);
    tar_builder.append_data(&mut header, csv_name, &mut Cursor::new(csv_buf))?;
    tar_builder.into_inner()?.finish()?;
    Ok(())
}

fn timed<R>(
    enabled: bool,
    f: impl FnOnce() -> Result<R, CliError>,
) -> Result<(R, Option<Duration>), CliError> {
    let start = enabled.then(Instant::now);
    let out = f()?;
    Ok((out, start.map(|s| s.elapsed())))
}

fn execute<T>(args: &Args) -> Result<(), CliError>
where
    T: Float + FromStr + Display + Send + Sync,
{
    let delimiter = delimiter_byte(args.delimiter)?;

    let (data, calc_duration) = timed(args.time, || {
        with_input(&args.input, |reader| {
            accumulate_stream::<T>(reader, delimiter, args.row_ids, args.chunk_rows)
        })
    })?;
    info!(
        "Matrix dimensions: {} rows x {} columns ({} chunks, {} pairs)",
        data.acc.rows(),
        data.names.len(),
        data.chunks,
        data.acc.cross_totals().len()
    );
    if let Some(duration) = calc_duration {
        info!(
            "Pearson sums accumulated in {:.3} seconds.",
            duration.as_secs_f64()
        );
    }

    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}_pearson_pairs.tar.gz",
            input_basename(&args.input)
        ))
    });
    let ((), output_duration) = timed(args.time, || {
        let csv_buf = pairs_tsv(&data)?;
        write_archive(&output, csv_buf)
    })?;
    info!("Wrote {}", output.display());

    if let (Some(calc), Some(out)) = (calc_duration, output_duration) {
        info!("Accumulation:   {:8.3} seconds", calc.as_secs_f64());
        info!("Output writing: {:8.3} seconds", out.as_secs_f64());
        info!("Total time:     {:8.3} seconds", (calc + out).as_secs_f64());
    }
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
        info!("Using {} threads.", threads);
    } else {
        info!("Using all available CPU cores.");
    }
    info!(
        "Accumulating in {} precision (available: {}).",
        args.precision,
        Precision::iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    match args.precision {
        Precision::F32 => execute::<f32>(&args),
        Precision::F64 => execute::<f64>(&args),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(text: &str, row_ids: bool, chunk_rows: usize) -> Result<Accumulated<f64>, CliError> {
        accumulate_stream(&mut Cursor::new(text.as_bytes()), b'\t', row_ids, chunk_rows)
    }

    #[test]
    fn streams_chunks_into_one_accumulator() {
        let text = "id\ta\tb\tc\nr1\t1\t2\t3\nr2\t2\t4\t6\nr3\t3\t6\t9\nr4\t4\t8\t12\nr5\t5\t10\t16\n";
        let data = stream(text, true, 2).unwrap();
        assert_eq!(data.names, vec!["a", "b", "c"]);
        assert_eq!(data.acc.rows(), 5);
        assert_eq!(data.chunks, 3);
        let res = data.acc.results();
        assert!((res.get(0, 1).unwrap() - 1.0).abs() < 1e-12);
        assert!(res.get(0, 2).unwrap() > 0.99);
    }

    #[test]
    fn chunking_does_not_change_results() {
        let text = "a\tb\n1\t5\n2\t3\n3\t4\n4\t1\n5\t2\n6\t0\n7\t1\n";
        let whole = stream(text, false, 100).unwrap().acc.results();
        let chunked = stream(text, false, 3).unwrap().acc.results();
        assert!((whole.get(0, 1).unwrap() - chunked.get(0, 1).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn bad_records_report_their_line() {
        let err = stream("a\tb\n1\t2\n3\n", false, 10).unwrap_err();
        assert!(matches!(
            err,
            CliError::Record {
                line: 3,
                source: CorrError::ColumnCountMismatch {
                    expected: 2,
                    found: 1
                }
            }
        ));
        let err = stream("a\tb\n1\tNA\n", false, 10).unwrap_err();
        assert!(matches!(
            err,
            CliError::Record {
                line: 2,
                source: CorrError::Parse { .. }
            }
        ));
    }

    #[test]
    fn single_value_column_is_rejected() {
        assert!(matches!(
            stream("id\ta\nr1\t1\n", true, 10),
            Err(CliError::Input(_))
        ));
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        assert!(matches!(
            stream("a\tb\n1\t2\n", false, usize::MAX),
            Err(CliError::Input(_))
        ));
    }

    #[test]
    fn tsv_lists_every_pair_in_order() {
        let data = stream("x\ty\tz\n1\t2\t0\n2\t1\t0\n", false, 10).unwrap();
        let text = String::from_utf8(pairs_tsv(&data).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "column_a\tcolumn_b\tpearson");
        assert_eq!(lines[1], "x\ty\t-1");
        assert_eq!(lines[2], "x\tz\t0");
        assert_eq!(lines[3], "y\tz\t0");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn basename_strips_compression_and_extension() {
        assert_eq!(input_basename(Path::new("/tmp/expr.tsv")), "expr");
        assert_eq!(input_basename(Path::new("expr.tsv.gz")), "expr");
        assert_eq!(input_basename(Path::new("expr.tar.gz")), "expr");
        assert_eq!(
            input_basename(Path::new("out/expr_pearson_pairs.tar.gz")),
            "expr_pearson_pairs"
        );
    }

    #[test]
    fn precision_parses_case_insensitively() {
        assert_eq!("F32".parse::<Precision>().unwrap(), Precision::F32);
        assert_eq!("double".parse::<Precision>().unwrap(), Precision::F64);
        assert!("f16".parse::<Precision>().is_err());
        assert_eq!(Precision::F64.to_string(), "f64");
    }

    #[test]
    fn delimiter_must_be_ascii() {
        assert_eq!(delimiter_byte(',').unwrap(), b',');
        assert!(delimiter_byte('é').is_err());
    }
}
