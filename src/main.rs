//! Binary entry point for `multiedit`.

use multiedit::EditError;
use std::process;

fn main() {
    if let Err(e) = multiedit::run() {
        eprintln!("Error: {}", e);
        let rollback_error = e.as_commit_failure().and_then(|f| f.rollback_error());
        if let Some(rollback_error) = rollback_error {
            eprintln!("Error: {}", rollback_error);
            process::exit(2);
        }
        process::exit(1);
    }
}
