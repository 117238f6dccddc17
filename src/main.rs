//! `check-mysql <check> [options]`
//!
//! Prints `MySQL <Check> <SEVERITY>: <message>` and exits with
//! 0 (OK), 1 (WARNING), 2 (CRITICAL) or 3 (UNKNOWN).
//!
//! Run with
//!
//! ```not_rust
//! check-mysql --replay recorded.yml group-replication --local-hostname db1 -g
//! ```

use check_mysql::cli::Cli;
use check_mysql::core::{logger, Severity};
use clap::Parser;

fn main() {
    logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help / --version 正常退出，其余参数错误按UNKNOWN处理
            if !err.use_stderr() {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(Severity::Unknown.exit_code());
        }
    };

    let report = cli.run();
    println!("{}", report.render(cli.output));
    std::process::exit(report.exit_code());
}
