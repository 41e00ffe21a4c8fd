mod console;
mod logger;

use ansi_term::Style;
use chrono::Timelike;
use log::LevelFilter;
use qcvm::mach::{cmds, Config, Progs};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

const USAGE: &str = "\
usage: qcvm [options] progs.dat [function]

  -d            start in the debugger
  -t            trace every statement
  -p            allow builtins the host does not provide
  -u            skip pointer and entity bounds checks
  --profile     print a profile after the run
  -v            verbose logging
  -q            only log errors
  --source DIR  where to look for source files
  --seed N      seed the random builtin
";

struct Options {
    config: Config,
    debug: bool,
    profile: bool,
    level: LevelFilter,
    seed: Option<u64>,
    progs: PathBuf,
    function: String,
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options {
        config: Config::default(),
        debug: false,
        profile: false,
        level: LevelFilter::Warn,
        seed: None,
        progs: PathBuf::new(),
        function: "main".to_string(),
    };
    let mut positional = Vec::new();
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-d" => options.debug = true,
            "-t" => options.config.trace = true,
            "-p" => options.config.permissive_builtins = true,
            "-u" => options.config.bounds_check = false,
            "--profile" => options.profile = true,
            "-v" => options.level = LevelFilter::Debug,
            "-q" => options.level = LevelFilter::Error,
            "--source" => options.config.source_path = PathBuf::from(args.next()?),
            "--seed" => options.seed = Some(args.next()?.parse().ok()?),
            s if s.starts_with('-') => return None,
            s => positional.push(s),
        }
    }
    match positional.as_slice() {
        [progs] => options.progs = PathBuf::from(progs),
        [progs, function] => {
            options.progs = PathBuf::from(progs);
            options.function = function.to_string();
        }
        _ => return None,
    }
    Some(options)
}

pub fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Some(options) => options,
        None => {
            eprint!("{}", USAGE);
            std::process::exit(2);
        }
    };
    logger::init(options.level);
    if let Err(error) = run(options) {
        eprintln!("{}", Style::new().bold().paint(error));
        std::process::exit(1);
    }
}

fn run(options: Options) -> Result<(), String> {
    let mut progs = Progs::new(options.config);
    cmds::register(&mut progs, options.seed).map_err(|e| e.to_string())?;

    let interrupted = progs.interrupt_flag();
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    })
    .map_err(|e| format!("Error setting Ctrl-C handler: {}", e))?;

    load(&mut progs, &options.progs).map_err(|e| e.to_string())?;

    if options.debug {
        let console = console::Console::new().map_err(|e| e.to_string())?;
        progs.set_debug_handler(Some(Box::new(console)));
        let first = progs
            .find_function(&options.function)
            .and_then(|fnum| progs.function(fnum as usize))
            .map(|f| f.def.first_statement)
            .filter(|&first| first > 0);
        if let Some(first) = first {
            progs
                .set_breakpoint(first as u32)
                .map_err(|e| e.to_string())?;
        }
    }

    let result = progs.call_by_name(&options.function, &[]);
    if options.profile {
        for (name, count) in progs.profile() {
            println!("{:>10} {}", count, name);
        }
    }
    if let Err(error) = result {
        return Err(error.to_string());
    }
    let float: f32 = progs.return_value().map_err(|e| e.to_string())?;
    let int: i32 = progs.return_value().map_err(|e| e.to_string())?;
    println!("{} {}", float, int);
    Ok(())
}

fn load(progs: &mut Progs, path: &Path) -> Result<(), qcvm::prog::Error> {
    progs.load_file(path)?;
    if progs.find_global("time").is_some() {
        let seconds = chrono::Local::now().num_seconds_from_midnight();
        progs.set_time(seconds as f32)?;
    }
    Ok(())
}
