use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;

use log::{error, info, LevelFilter};

use phrase_count::logging::set_logger_or_exit;
use phrase_count::util::{get_cputime_usecs, parse_args, separator_byte, Config};
use phrase_count::{find_top_phrases_with, SearchConfig, SearchError, TopPhrase};

fn main() {
    let conf = parse_args("top phrases - most frequent phrases of a separated text file");

    let log_level = if conf.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    set_logger_or_exit(&conf.log_stream, log_level);

    if let Err(err) = run(&conf) {
        error!("{}", err);
        exit(1);
    }
}

fn run(conf: &Config) -> Result<(), SearchError> {
    let input = conf
        .input
        .as_ref()
        .ok_or_else(|| SearchError::InvalidArgument("missing input file".to_string()))?;

    let search_conf = SearchConfig {
        separator: separator_byte(&conf.separator)?,
        work_dir: conf.work_dir.clone().map(PathBuf::from),
        keep_on_failure: conf.keep_storage,
    };

    let (start_usr_time, start_sys_time) = get_cputime_usecs();
    let start_time = Instant::now();

    let phrases = find_top_phrases_with(Path::new(input), conf.top, &search_conf)?;

    let (end_usr_time, end_sys_time) = get_cputime_usecs();
    let difference = start_time.elapsed();
    let usr_time = (end_usr_time - start_usr_time) as f64 / 1_000_000.0;
    let sys_time = (end_sys_time - start_sys_time) as f64 / 1_000_000.0;
    info!(
        "top {} of \"{}\": {:.3}s real, {:.3}s usr, {:.3}s sys",
        phrases.len(),
        input,
        difference.as_secs_f64(),
        usr_time,
        sys_time
    );

    write_out(&phrases)?;
    Ok(())
}

fn write_out(phrases: &[TopPhrase]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for phrase in phrases {
        let text = String::from_utf8_lossy(&phrase.text);
        let out = &*format!("{}\t{}\n", phrase.count, text);
        io::copy(&mut out.as_bytes(), &mut stdout)?;
    }
    Ok(())
}
