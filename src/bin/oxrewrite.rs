//! Command-line URL rewriter for XHTML pages.
//!
//! Streams each input through the rewrite engine and prints the result:
//! links, forms and resource references are resolved against a context
//! path and a request path.

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};

use oxfxml::parser::{parse_bytes_sax, ParseOptions};
use oxfxml::rewrite::{url_rewrite_handler, ContextPathRewriter, RewriteOptions};
use oxfxml::serial::{SerializeOptions, XmlWriter};
use oxfxml::util::qname::XHTML_NAMESPACE;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// oxrewrite -- rewrite the URLs of XHTML pages for a web context.
#[derive(Parser, Debug)]
#[command(name = "oxrewrite", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Files to rewrite (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// Context path prepended to absolute paths, e.g. `/app`.
    #[arg(long, default_value = "")]
    context_path: String,

    /// Path of the page being rewritten, used for relative URLs.
    #[arg(long, default_value = "/")]
    request_path: String,

    /// Namespace of the elements to rewrite. Defaults to XHTML; pass an
    /// empty string for un-namespaced HTML.
    #[arg(long, value_name = "URI")]
    rewrite_uri: Option<String>,

    /// Force `method="post"` on forms without a method.
    #[arg(long)]
    portlet: bool,

    /// Accept several top-level elements.
    #[arg(long)]
    fragment: bool,

    /// Indent the output.
    #[arg(long)]
    format: bool,

    /// Omit the XML declaration.
    #[arg(long)]
    no_declaration: bool,

    /// Write the result to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Log state transitions and timings to stderr.
    #[arg(long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Warn
        });
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut output = String::new();
    let mut worst_exit: u8 = 0;
    for filename in &cli.files {
        match process_file(&cli, filename) {
            Ok(rewritten) => output.push_str(&rewritten),
            Err(code) => worst_exit = worst_exit.max(code),
        }
    }

    if let Err(e) = write_output(cli.output.as_deref(), &output) {
        eprintln!("failed to write output: {e}");
        return ExitCode::from(3);
    }
    ExitCode::from(worst_exit)
}

/// Rewrites one input. The error is the exit code to report.
fn process_file(cli: &Cli, filename: &str) -> Result<String, u8> {
    let start_read = Instant::now();
    let input = read_input(filename).map_err(|e| {
        eprintln!("{filename}: failed to read: {e}");
        1
    })?;
    if cli.verbose {
        eprintln!("Reading file {filename} took {:?}", start_read.elapsed());
    }

    let serialize = SerializeOptions::default()
        .indent(cli.format)
        .xml_declaration(!cli.no_declaration);
    let rewriter = ContextPathRewriter::new(cli.context_path.as_str(), cli.request_path.as_str());
    let options = RewriteOptions::default()
        .rewrite_uri(cli.rewrite_uri.as_deref().unwrap_or(XHTML_NAMESPACE))
        .portlet(cli.portlet)
        .fragment(cli.fragment);
    let mut handler = url_rewrite_handler(rewriter, XmlWriter::with_options(serialize), &options);

    let parse = ParseOptions::default()
        .fragment(cli.fragment)
        .system_id(filename);
    let start_rewrite = Instant::now();
    parse_bytes_sax(&input, &parse, &mut handler).map_err(|e| {
        eprintln!("{filename}: {e}");
        2
    })?;
    if cli.verbose {
        eprintln!("Rewriting took {:?}", start_rewrite.elapsed());
    }

    let mut rewritten = handler.into_inner().into_string();
    if !rewritten.ends_with('\n') {
        rewritten.push('\n');
    }
    Ok(rewritten)
}

fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}

fn write_output(path: Option<&str>, output: &str) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, output),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()
        }
    }
}
