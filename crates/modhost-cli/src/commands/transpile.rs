//! `modhost transpile` command implementation.
//!
//! Prints the CommonJS rewrite of an ES module file.

use miette::{IntoDiagnostic, Result, WrapErr};
use modhost_runtime::esm_to_cjs;
use modhost_util::fs::read_to_string_lossy;
use modhost_util::path::display_slash;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct TranspileResult {
    path: String,
    code: String,
}

pub fn run(cwd: &Path, file: &Path, json: bool) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    };

    let source = read_to_string_lossy(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let code = esm_to_cjs(&source);
    tracing::debug!(bytes_in = source.len(), bytes_out = code.len(), "transpiled");

    if json {
        let result = TranspileResult {
            path: display_slash(&path),
            code,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        print!("{code}");
        if !code.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
