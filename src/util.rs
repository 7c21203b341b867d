use std::mem;

use argparse::{ArgumentParser, Print, Store, StoreOption, StoreTrue};
use libc::{getrusage, rusage, RUSAGE_SELF};

use crate::error::SearchError;

pub struct Config {
    pub input: Option<String>,
    pub top: usize,
    pub separator: String,
    pub work_dir: Option<String>,
    pub keep_storage: bool,
    pub log_stream: String,
    pub verbose: bool,
}

pub fn parse_args(description: &str) -> Config {
    let mut conf: Config = Config {
        input: None,
        top: 10,
        separator: "|".to_string(),
        work_dir: None,
        keep_storage: false,
        log_stream: "-".to_string(),
        verbose: false,
    };

    {
        // this block limits scope of borrows by ap.refer() method
        let mut ap = ArgumentParser::new();

        ap.set_description(description);
        ap.add_option(
            &["-V", "--version"],
            Print(env!("CARGO_PKG_VERSION").to_string()),
            "Show version",
        );

        ap.refer(&mut conf.input)
            .add_argument("input", StoreOption, "input file with phrases");

        ap.refer(&mut conf.top).add_option(
            &["-k", "--top"],
            Store,
            "amount of top phrases - default: 10",
        );

        ap.refer(&mut conf.separator).add_option(
            &["-s", "--separator"],
            Store,
            "phrase separator byte - default: '|'",
        );

        ap.refer(&mut conf.work_dir).add_option(
            &["--work-dir"],
            StoreOption,
            "base directory for the on-disk counter storage - default: system temp",
        );

        ap.refer(&mut conf.keep_storage).add_option(
            &["--keep-storage"],
            StoreTrue,
            "keep the counter storage of a failed run for inspection",
        );

        ap.refer(&mut conf.log_stream).add_option(
            &["--log"],
            Store,
            "log file - default: stderr (\"-\")",
        );

        ap.refer(&mut conf.verbose).add_option(
            &["-v", "--verbose"],
            StoreTrue,
            "log phase details",
        );

        ap.parse_args_or_exit();
    }

    return conf;
}

/// Single-byte separator from its command line spelling.
pub fn separator_byte(arg: &str) -> Result<u8, SearchError> {
    let raw = arg.as_bytes();
    if raw.len() != 1 {
        return Err(SearchError::InvalidArgument(format!(
            "separator must be a single byte, got \"{}\"",
            arg
        )));
    }
    Ok(raw[0])
}

pub fn get_cputime_usecs() -> (u64, u64) {
    let mut usage: rusage = unsafe { mem::zeroed() };
    unsafe {
        getrusage(RUSAGE_SELF, (&mut usage) as *mut rusage);
    }

    let u_secs = usage.ru_utime.tv_sec as u64;
    let u_usecs = usage.ru_utime.tv_usec as u64;
    let s_secs = usage.ru_stime.tv_sec as u64;
    let s_usecs = usage.ru_stime.tv_usec as u64;

    let u_time = (u_secs * 1_000_000) + u_usecs;
    let s_time = (s_secs * 1_000_000) + s_usecs;

    (u_time, s_time)
}
