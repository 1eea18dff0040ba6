use std::fmt::Display;
use std::path::Path;
use std::process;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};
use log::LevelFilter;

use rrsim::trace::{self, Flags};
use rrsim::{
    logger, Controller, Policy, RandFilePolicy, RandGenerator, RandomPolicy, ReenqueuePolicy,
    SimConfig, SimError, SimResult, TickRange,
};

struct Options {
    cfg: SimConfig,
    rfile: Option<String>,
    flags: Flags,
    stats: bool,
    log_level: LevelFilter,
}

fn valid_range(value: &str) -> Result<(), String> {
    value.parse::<TickRange>().map(|_| ())
}

fn value<T>(matches: &ArgMatches, name: &str) -> SimResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    matches
        .value_of(name)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| SimError::Config(format!("--{} {}: {}", name, v, e)))
        })
        .transpose()
}

fn build_app() -> App<'static> {
    App::new("rrsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Round-robin CPU scheduler simulation")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .help("TOML file with simulation settings"),
        )
        .arg(
            Arg::new("processes")
                .short('n')
                .long("processes")
                .takes_value(true)
                .help("number of simulated processes"),
        )
        .arg(
            Arg::new("quantum")
                .short('t')
                .long("quantum")
                .takes_value(true)
                .help("time quantum in ticks"),
        )
        .arg(
            Arg::new("burst")
                .short('b')
                .long("burst")
                .takes_value(true)
                .validator(valid_range)
                .help("CPU burst range MIN:MAX"),
        )
        .arg(
            Arg::new("io_wait")
                .short('w')
                .long("io-wait")
                .takes_value(true)
                .validator(valid_range)
                .help("I/O wait range MIN:MAX"),
        )
        .arg(
            Arg::new("exit_probability")
                .short('p')
                .long("exit-probability")
                .takes_value(true)
                .help("chance a finished burst ends the process instead of doing I/O"),
        )
        .arg(
            Arg::new("tick_ms")
                .long("tick-ms")
                .takes_value(true)
                .help("milliseconds per tick, 0 to run flat out"),
        )
        .arg(
            Arg::new("reply_timeout_ms")
                .long("reply-timeout-ms")
                .takes_value(true)
                .help("how long to wait for a worker's answer"),
        )
        .arg(
            Arg::new("max_ticks")
                .long("max-ticks")
                .takes_value(true)
                .help("abort if not finished after this many ticks"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .takes_value(true)
                .help("seed for the random policy"),
        )
        .arg(
            Arg::new("rfile")
                .short('r')
                .long("rfile")
                .takes_value(true)
                .help("random number file (count, then values)"),
        )
        .arg(
            Arg::new("strict_queue")
                .long("strict-queue")
                .help("fail instead of ignoring a re-enqueue of a queued process"),
        )
        .arg(Arg::new("v_flag").short('v').help("trace transitions"))
        .arg(Arg::new("q_flag").short('q').help("trace queues"))
        .arg(
            Arg::new("no_stats")
                .long("no-stats")
                .help("skip the statistics table"),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .takes_value(true)
                .possible_values(["off", "error", "warn", "info", "debug", "trace"])
                .default_value("warn")
                .help("diagnostics written to stderr"),
        )
}

fn parse_args(actual_args: &[String]) -> SimResult<Options> {
    let matches = build_app().get_matches_from(actual_args);

    let mut cfg = match matches.value_of("config") {
        Some(path) => SimConfig::load(Path::new(path))?,
        None => SimConfig::default(),
    };
    if let Some(n) = value(&matches, "processes")? {
        cfg.processes = n;
    }
    if let Some(q) = value(&matches, "quantum")? {
        cfg.quantum = q;
    }
    if let Some(range) = value(&matches, "burst")? {
        cfg.cpu_burst = range;
    }
    if let Some(range) = value(&matches, "io_wait")? {
        cfg.io_wait = range;
    }
    if let Some(p) = value(&matches, "exit_probability")? {
        cfg.exit_probability = p;
    }
    if let Some(ms) = value(&matches, "tick_ms")? {
        cfg.tick_ms = ms;
    }
    if let Some(ms) = value(&matches, "reply_timeout_ms")? {
        cfg.reply_timeout_ms = ms;
    }
    if let Some(limit) = value(&matches, "max_ticks")? {
        cfg.max_ticks = Some(limit);
    }
    if let Some(seed) = value(&matches, "seed")? {
        cfg.seed = Some(seed);
    }
    if matches.is_present("strict_queue") {
        cfg.reenqueue = ReenqueuePolicy::Reject;
    }
    cfg.validate()?;

    let log_level = value(&matches, "log_level")?.unwrap_or(LevelFilter::Warn);

    Ok(Options {
        cfg,
        rfile: matches.value_of("rfile").map(str::to_owned),
        flags: Flags {
            v_option: matches.is_present("v_flag"),
            q_option: matches.is_present("q_flag"),
        },
        stats: !matches.is_present("no_stats"),
        log_level,
    })
}

fn print_banner(cfg: &SimConfig) {
    println!("======================================================");
    println!("           round-robin scheduling simulation");
    println!("======================================================");
    println!("  processes:        {}", cfg.processes);
    println!("  time quantum:     {}", cfg.quantum);
    println!("  cpu burst range:  {}", cfg.cpu_burst);
    println!("  io wait range:    {}", cfg.io_wait);
    println!("  exit probability: {}", cfg.exit_probability);
    println!("======================================================");
}

fn actual_main_fn(opts: Options) -> SimResult<()> {
    if logger::init(opts.log_level).is_err() {
        eprintln!("rrsim: logger already installed");
    }
    trace::set_flags(opts.flags);
    print_banner(&opts.cfg);

    let policy: Box<dyn Policy> = match &opts.rfile {
        Some(path) => Box::new(RandFilePolicy::new(RandGenerator::new(Path::new(path))?, &opts.cfg)),
        None => Box::new(RandomPolicy::new(&opts.cfg)),
    };

    let report = Controller::launch(opts.cfg, policy)?.run()?;

    if opts.stats {
        println!();
        println!("{}", report);
    }
    Ok(())
}

fn get_default_args() -> Vec<String> {
    vec!["rrsim".to_string(), "-v".to_string(), "-q".to_string()]
}

fn main() {
    let default_args = get_default_args();
    let args = std::env::args().collect::<Vec<String>>();
    let actual_args = if args.len() > 1 { &args } else { &default_args };

    let code = match parse_args(actual_args).and_then(actual_main_fn) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("rrsim: {}", e);
            1
        }
    };
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("rrsim").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn cli_overrides_defaults() {
        let opts = parse_args(&args(&[
            "-n", "3", "-t", "2", "-b", "2:4", "--io-wait", "1-2", "--seed", "5", "-v",
            "--strict-queue",
        ]))
        .unwrap();
        assert_eq!(opts.cfg.processes, 3);
        assert_eq!(opts.cfg.quantum, 2);
        assert_eq!(opts.cfg.cpu_burst, TickRange::new(2, 4));
        assert_eq!(opts.cfg.io_wait, TickRange::new(1, 2));
        assert_eq!(opts.cfg.seed, Some(5));
        assert_eq!(opts.cfg.reenqueue, ReenqueuePolicy::Reject);
        assert!(opts.flags.v_option);
        assert!(!opts.flags.q_option);
        assert!(opts.stats);
        assert_eq!(opts.log_level, LevelFilter::Warn);
    }

    #[test]
    fn inverted_range_fails_before_launch() {
        let err = parse_args(&args(&["-b", "9:3"])).err();
        assert!(matches!(err, Some(SimError::Config(_))));
    }

    #[test]
    fn non_numeric_count_is_a_config_error() {
        let err = parse_args(&args(&["-n", "many"])).err();
        assert!(matches!(err, Some(SimError::Config(_))));
    }

    #[test]
    fn oversized_process_count_is_a_config_error() {
        let err = parse_args(&args(&["-n", "18446744073709551615", "--tick-ms", "0"])).err();
        assert!(matches!(err, Some(SimError::Config(_))));
    }

    #[test]
    fn default_args_turn_on_both_traces() {
        let opts = parse_args(&get_default_args()).unwrap();
        assert!(opts.flags.v_option && opts.flags.q_option);
        assert_eq!(opts.cfg, SimConfig::default());
    }
}
