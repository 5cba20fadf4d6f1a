use std::fs;
use std::process::ExitCode;

use stripdom::rules::parse_rules;
use stripdom::{Comparator, XPathComparator};
use thiserror::Error;
use tracing::{info, span, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: stripdom [--trace] [--ignore SELECTOR]... [--rules FILE] BEFORE AFTER";

struct Args {
    pub before: String,
    pub after: String,
    pub ignore: Vec<String>,
    pub rules: Option<String>,
    pub trace: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("stripdom: {}\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    if args.trace {
        tracing_subscriber::fmt::fmt()
            .with_span_events(FmtSpan::ACTIVE)
            .with_max_level(Level::DEBUG)
            .with_env_filter(EnvFilter::from_default_env())
            .finish()
            .init();
        info!("Logger initialized");
    }

    match compare_files(&args) {
        Ok(true) => {
            println!("equivalent");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("not equivalent");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("stripdom: {}", e);
            ExitCode::from(2)
        }
    }
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();
    let args = Args {
        trace: pargs.contains(["-t", "--trace"]),
        ignore: pargs.values_from_str(["-i", "--ignore"])?,
        rules: pargs.opt_value_from_str(["-r", "--rules"])?,
        before: pargs.free_from_str()?,
        after: pargs.free_from_str()?,
    };
    let rest = pargs.finish();
    if !rest.is_empty() {
        return Err(pico_args::Error::ArgumentParsingFailed {
            cause: format!("unexpected arguments {:?}", rest),
        });
    }
    Ok(args)
}

fn read(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })
}

fn compare_files(args: &Args) -> Result<bool, CliError> {
    let span = span!(Level::DEBUG, "Loading snapshots");
    let mut comparator = {
        let _enter = span.enter();
        let mut comparator = XPathComparator::new(read(&args.before)?, read(&args.after)?);
        if let Some(rules) = &args.rules {
            parse_rules(&read(rules)?)
                .into_iter()
                .for_each(|rule| comparator.add_expression(rule));
        }
        args.ignore
            .iter()
            .for_each(|rule| comparator.add_expression(rule.as_str()));
        comparator
    };
    Ok(comparator.is_equivalent())
}
