use std::ffi::OsString;
use std::io::{self, Write};

use pagekit::config::PolicyKind;
use pagesim::scenarios::{self, NAMES};
use pagesim::{SimReport, Simulator};

const USAGE: &str = "\
usage: pagesim [--json] [--policy clock|clockpro|both] [--scenario NAME]...

Runs canned workloads against the eviction engine and prints per-phase
hit rates. Scenarios: uniform, scan, readahead (default: all).
";

#[derive(Debug, Default)]
struct CliOptions {
    json: bool,
    policies: Vec<PolicyKind>,
    scenarios: Vec<String>,
    show_help: bool,
}

fn main() {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write!(err, "{USAGE}");
            return 2;
        }
    };
    if options.show_help {
        return match write!(out, "{USAGE}") {
            Ok(()) => 0,
            Err(_) => 1,
        };
    }

    let mut reports: Vec<(String, SimReport)> = Vec::new();
    for name in &options.scenarios {
        for &kind in &options.policies {
            let Some(scenario) = scenarios::by_name(name, kind) else {
                let _ = writeln!(err, "error: unknown scenario `{name}`");
                return 2;
            };
            let result = Simulator::new(scenario.config).and_then(|mut sim| sim.run(&scenario.trace));
            match result {
                Ok(report) => reports.push((name.clone(), report)),
                Err(error) => {
                    let _ = writeln!(err, "error: {name}/{kind}: {error}");
                    return 1;
                }
            }
        }
    }

    let written = if options.json {
        write_json(out, &reports)
    } else {
        write_table(out, &reports)
    };
    match written {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            1
        }
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();
    let mut options = CliOptions::default();

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "-h" | "--help" => options.show_help = true,
            "--json" => options.json = true,
            "--policy" => {
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing value for `--policy`"))?;
                options.policies = parse_policy(next.to_string_lossy().as_ref())?;
            }
            "--scenario" => {
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing value for `--scenario`"))?;
                let name = next.to_string_lossy().into_owned();
                if !NAMES.contains(&name.as_str()) {
                    return Err(format!("unknown scenario `{name}`"));
                }
                options.scenarios.push(name);
            }
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    if options.policies.is_empty() {
        options.policies = vec![PolicyKind::Clock, PolicyKind::ClockPro];
    }
    if options.scenarios.is_empty() {
        options.scenarios = NAMES.iter().map(|name| (*name).to_owned()).collect();
    }
    Ok(options)
}

fn parse_policy(value: &str) -> Result<Vec<PolicyKind>, String> {
    match value {
        "clock" => Ok(vec![PolicyKind::Clock]),
        "clockpro" | "clock-pro" => Ok(vec![PolicyKind::ClockPro]),
        "both" => Ok(vec![PolicyKind::Clock, PolicyKind::ClockPro]),
        other => Err(format!("unknown policy `{other}`")),
    }
}

fn write_table<W: Write>(out: &mut W, reports: &[(String, SimReport)]) -> io::Result<()> {
    for (name, report) in reports {
        writeln!(out, "== {name}")?;
        write!(out, "{report}")?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_json<W: Write>(out: &mut W, reports: &[(String, SimReport)]) -> io::Result<()> {
    let value: Vec<serde_json::Value> = reports
        .iter()
        .map(|(name, report)| {
            serde_json::json!({
                "scenario": name,
                "report": report,
            })
        })
        .collect();
    let text = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
    writeln!(out, "{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("pagesim")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn defaults_run_everything() {
        let options = parse_args(args(&[])).unwrap();
        assert_eq!(options.policies.len(), 2);
        assert_eq!(options.scenarios.len(), NAMES.len());
        assert!(!options.json);
    }

    #[test]
    fn rejects_unknown_scenario() {
        let err = parse_args(args(&["--scenario", "zipf"])).unwrap_err();
        assert!(err.contains("zipf"));
    }

    #[test]
    fn help_exits_cleanly() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        assert_eq!(run(args(&["--help"]), &mut out, &mut err), 0);
        assert!(String::from_utf8(out).unwrap().contains("usage"));
    }

    #[test]
    fn json_output_names_scenarios() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(
            args(&["--json", "--policy", "clock", "--scenario", "readahead"]),
            &mut out,
            &mut err,
        );
        assert_eq!(code, 0, "{}", String::from_utf8_lossy(&err));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"scenario\": \"readahead\""));
        assert!(text.contains("\"policy\": \"clock\""));
    }
}
