//! `modhost resolve` command implementation.
//!
//! Resolves one specifier against the working directory or a bundle and
//! reports the result, optionally with the step-by-step trace.

use miette::{IntoDiagnostic, Result, WrapErr};
use modhost_core::resolver::ResolveTraceStep;
use modhost_core::version::RESOLVE_SCHEMA_VERSION;
use modhost_core::{BundleSource, ModuleResolver, ResolveMode, ResolveTrace, ResolvedModule};
use modhost_util::path::display_slash;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Exit code when the specifier does not resolve.
const EXIT_UNRESOLVED: i32 = 1;

/// Options for one `resolve` invocation.
#[derive(Debug)]
pub struct ResolveAction<'a> {
    pub specifier: &'a str,
    pub from: Option<&'a Path>,
    pub mode: ResolveMode,
    pub bundle: Option<&'a Path>,
    pub trace: bool,
}

/// Result for JSON output.
#[derive(Serialize)]
struct ResolveReport<'a> {
    schema_version: u32,
    ok: bool,
    specifier: &'a str,
    mode: ResolveMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ReportError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<ResolveTrace>,
}

/// Error info for JSON output.
#[derive(Serialize)]
struct ReportError {
    code: &'static str,
    message: String,
}

pub fn run(cwd: &Path, action: &ResolveAction<'_>, json: bool) -> Result<()> {
    let resolver = match action.bundle {
        Some(dir) => {
            let dir = absolutize(cwd, dir);
            let bundle = BundleSource::from_directory(&dir)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to load bundle from {}", dir.display()))?;
            tracing::debug!(files = bundle.len(), "loaded bundle");
            ModuleResolver::bundle(bundle)
        }
        None => ModuleResolver::filesystem(cwd),
    };

    // Bundle referrers are already bundle-relative.
    let referrer = action.from.map(|from| {
        if action.bundle.is_some() {
            from.to_path_buf()
        } else {
            absolutize(cwd, from)
        }
    });

    let mut trace = ResolveTrace::new();
    let outcome =
        resolver.resolve_with_trace(action.specifier, referrer.as_deref(), action.mode, &mut trace);
    let ok = outcome.is_ok();

    match &outcome {
        Ok(resolved) => tracing::debug!(path = %display_slash(&resolved.path), "resolved"),
        Err(err) => tracing::debug!(code = err.code(), "unresolved: {err}"),
    }

    let (resolved, error) = match outcome {
        Ok(resolved) => (Some(resolved), None),
        Err(err) => (
            None,
            Some(ReportError {
                code: err.code(),
                message: err.to_string(),
            }),
        ),
    };

    let report = ResolveReport {
        schema_version: RESOLVE_SCHEMA_VERSION,
        ok,
        specifier: action.specifier,
        mode: action.mode,
        resolved,
        error,
        trace: action.trace.then_some(trace),
    };

    if json {
        let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{out}");
    } else {
        print_human(&report)?;
    }

    if !ok {
        std::process::exit(EXIT_UNRESOLVED);
    }
    Ok(())
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn print_human(report: &ResolveReport<'_>) -> Result<()> {
    let mut out = io::stdout().lock();

    if let Some(resolved) = &report.resolved {
        w(&mut out, &format!("{}\n", display_slash(&resolved.path)))?;
        w(
            &mut out,
            &format!("  format: {}  storage: {}\n", resolved.format, resolved.storage),
        )?;
    }

    if let Some(trace) = &report.trace {
        w(&mut out, &format!("\ntrace ({}):\n", report.mode))?;
        for step in &trace.steps {
            w(&mut out, &format_step(step))?;
        }
        for warning in &trace.warnings {
            w(&mut out, &format!("  warning[{}]: {}\n", warning.code, warning.message))?;
        }
        if !trace.tried.is_empty() {
            w(&mut out, "  tried:\n")?;
            for path in &trace.tried {
                w(&mut out, &format!("    {}\n", display_slash(path)))?;
            }
        }
    }

    if let Some(error) = &report.error {
        eprintln!("error[{}]: {}", error.code, error.message);
    }

    Ok(())
}

fn format_step(step: &ResolveTraceStep) -> String {
    let mark = if step.ok { "ok  " } else { "FAIL" };
    let mut line = format!("  {mark} {:<20} {}", step.step, step.detail);
    if let Some(key) = &step.key {
        line.push_str(&format!(" key={key}"));
    }
    if let Some(condition) = &step.condition {
        line.push_str(&format!(" condition={condition}"));
    }
    if let Some(target) = &step.target {
        line.push_str(&format!(" target={target}"));
    }
    if let Some(path) = &step.path {
        line.push_str(&format!(" ({})", display_slash(path)));
    }
    for note in &step.notes {
        line.push_str(&format!(" [{note}]"));
    }
    line.push('\n');
    line
}

fn w(out: &mut impl Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes()).into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_step() {
        let step = ResolveTraceStep::new("match_exports_key", true, "matched")
            .with_key("./feature")
            .with_condition(Some("require"))
            .with_target("./lib/feature.cjs");
        assert_eq!(
            format_step(&step),
            "  ok   match_exports_key    matched key=./feature condition=require target=./lib/feature.cjs\n"
        );
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize(Path::new("/app"), Path::new("src/a.js")),
            PathBuf::from("/app/src/a.js")
        );
        assert_eq!(
            absolutize(Path::new("/app"), Path::new("/b.js")),
            PathBuf::from("/b.js")
        );
    }
}
