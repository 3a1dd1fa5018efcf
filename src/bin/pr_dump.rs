use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use log::{LevelFilter, debug};
use simplelog::{Config, WriteLogger};

use prfile::{DecodedResult, ParserSettings, PopulationNode, PrParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The events table followed by the population table.
    Text,
    /// Only the events table.
    Csv,
    Json,
}

/// Utility to dump the event populations stored in PR (and `.cyt`) files.
#[derive(Parser, Debug)]
#[command(name = "pr_dump", version, arg_required_else_help = true)]
struct Cli {
    /// Input `.pr` file or `.cyt` archive.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    input: PathBuf,

    #[arg(short = 'o', long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    output_format: OutputFormat,

    /// Write output to this file instead of stdout.
    #[arg(short = 'f', long = "output", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Column separator for the events table.
    #[arg(long, default_value = ";")]
    separator: String,

    /// Ignore the population document embedded in newer files.
    #[arg(long = "no-xml")]
    no_xml: bool,

    /// Name of the PR entry inside `.cyt` archives.
    #[arg(long, default_value = prfile::pr_parser::DEFAULT_ARCHIVE_ENTRY)]
    entry: String,

    /// Sets debug prints level for the application:
    ///     -v   - info,
    ///     -vv  - debug,
    ///     -vvv - trace
    #[arg(short = 'v', action = ArgAction::Count, verbatim_doc_comment)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn settings(&self) -> ParserSettings {
        ParserSettings::new()
            .xml_override(!self.no_xml)
            .archive_entry(self.entry.clone())
    }

    fn open_output(&self) -> Result<Box<dyn Write>> {
        match &self.output {
            None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
            Some(path) => {
                if path.is_dir() {
                    bail!(
                        "There is a directory at {}, refusing to overwrite",
                        path.display()
                    );
                }
                let file = File::create(path)
                    .with_context(|| format!("failed to create output file {}", path.display()))?;
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

fn dump_events(out: &mut dyn Write, result: &DecodedResult, separator: &str) -> io::Result<()> {
    writeln!(out, "event{separator}populationID")?;
    for (event, population) in result.event_population_ids.iter().enumerate() {
        writeln!(out, "{event}{separator}{population}")?;
    }
    Ok(())
}

fn dump_populations(out: &mut dyn Write, populations: &[PopulationNode]) -> io::Result<()> {
    for population in populations {
        let children = population
            .children
            .iter()
            .map(|child| child.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        writeln!(
            out,
            "{{ id:{}, name:\"{}\", subpopulations: [{}] }}",
            population.id,
            population.name.as_deref().unwrap_or("null"),
            children
        )?;
        dump_populations(out, &population.children)?;
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let parser = PrParser::new().with_configuration(cli.settings());
    let result = parser
        .decode_path(&cli.input)
        .with_context(|| format!("failed to decode {}", cli.input.display()))?;
    debug!(
        "{} events, {} top-level populations",
        result.event_count(),
        result.populations.len()
    );

    let mut out = cli.open_output()?;
    match cli.output_format {
        OutputFormat::Text => {
            writeln!(out, "\nEVENTS TABLE")?;
            dump_events(&mut out, &result, &cli.separator)?;
            writeln!(out, "\nPOPULATION TABLE")?;
            dump_populations(&mut out, &result.populations)?;
        }
        OutputFormat::Csv => dump_events(&mut out, &result, &cli.separator)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &result)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = WriteLogger::init(cli.log_level(), Config::default(), io::stderr()) {
        eprintln!("Failed to initialize logging: {e:?}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("{e:?}");
        exit(1);
    }
}
