#![allow(dead_code)]

use std::{fs, path::PathBuf};

use portan::{
    app::{input_parse::MarketDataFiles, Options},
    util::{date::pub_testlib::ymd, os::env_var_non_empty, rw::DescribedReader},
};

fn test_temp_dir_path() -> PathBuf {
    let tmpdir = std::env::temp_dir();

    let make_file_path = |val| {
        let fname = format!("portan-test-{}-{}", std::process::id(), val);
        tmpdir.join(fname)
    };

    for val in 1..1000000 {
        let path = make_file_path(val);
        if !path.exists() {
            return path;
        }
    }
    panic!("Could not create temp directory path that does not already exist");
}

/// A temp dir path which is removed on drop, but not created up front.
pub struct NonAutoCreatingTestDir {
    pub path: PathBuf,
}

impl NonAutoCreatingTestDir {
    pub fn new() -> NonAutoCreatingTestDir {
        NonAutoCreatingTestDir {
            path: test_temp_dir_path(),
        }
    }

    pub fn path_str(&self) -> String {
        self.path.to_str().unwrap().to_string()
    }
}

fn cleanup_test_dir(path: &PathBuf) {
    if path.exists() {
        let skip_env_var = "SKIP_TEMP_DIR_CLEANUP_ON_FAIL";
        let skip_del_on_fail = env_var_non_empty(skip_env_var);

        if std::thread::panicking() && skip_del_on_fail {
            println!(
                "cleanup_test_dir: panicking. Skipping remove of {}",
                path.display()
            );
        } else {
            println!(
                "cleanup_test_dir: removing {}. To skip cleanup, set {}",
                path.display(),
                skip_env_var
            );
            let _ = fs::remove_dir_all(path);
        }
    } else {
        println!("cleanup_test_dir: {} did not exist", path.display());
    }
}

impl Drop for NonAutoCreatingTestDir {
    fn drop(&mut self) {
        cleanup_test_dir(&self.path);
    }
}

pub fn csv_reader(name: &str, text: &str) -> DescribedReader {
    DescribedReader::from_string(name.to_string(), text.to_string())
}

/// Market data files given as in-memory CSV text. Empty text means absent.
pub fn market_files(splits: &str, prices: &str, fx_rates: &str) -> MarketDataFiles {
    let opt = |name: &str, text: &str| {
        if text.is_empty() {
            None
        } else {
            Some(csv_reader(name, text))
        }
    };
    MarketDataFiles {
        splits: opt("splits.csv", splits),
        prices: opt("prices.csv", prices),
        fx_rates: opt("fx_rates.csv", fx_rates),
    }
}

pub fn options_at(year: i32, month: u8, day: u8) -> Options {
    Options {
        valuation_date: Some(ymd(year, month, day)),
        fetch_timeout: None,
        ..Options::default()
    }
}
