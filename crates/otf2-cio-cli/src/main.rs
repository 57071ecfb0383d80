mod csv_out;
mod dot;
mod log;
mod trace_reader;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use otf2_cio_builder::{build, BuilderConfig};
use otf2_cio_sets::{discover_fragments, find_cio_sets};
use otf2_cio_types::Graph;

use trace_reader::JsonLineTrace;

fn main() {
    log::init();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage());
    }

    let command = args.remove(0);
    match command.as_str() {
        "sets" => run_sets(args),
        "pio" => run_pio(args),
        "graph" => run_graph(args),
        "-h" | "--help" | "help" => {
            println!("{}", usage());
            Ok(())
        }
        other => Err(format!("unknown command: {other}\n\n{}", usage())),
    }
}

fn usage() -> String {
    "otf2-cio commands:\n  sets <trace-path>\n  pio <trace-path>\n  graph <trace-path> [--dot]"
        .to_string()
}

fn run_sets(args: Vec<String>) -> Result<(), String> {
    let trace_path = positional_trace_path(&args, "sets <trace-path>")?;
    let graph = build_graph(&trace_path)?;
    let sets = find_cio_sets(&graph).map_err(|e| format!("{e}"))?;

    let experiment_dir = make_experiment_dir()?;
    csv_out::write_summary(&experiment_dir, &graph)?;
    csv_out::write_cio_sets(&experiment_dir, &graph, &sets)?;
    println!(
        "wrote {} CIO-Set(s) to {}",
        sets.len(),
        experiment_dir.display()
    );
    Ok(())
}

fn run_pio(args: Vec<String>) -> Result<(), String> {
    let trace_path = positional_trace_path(&args, "pio <trace-path>")?;
    let graph = build_graph(&trace_path)?;
    let fragments = discover_fragments(&graph).map_err(|e| format!("{e}"))?;

    let experiment_dir = make_experiment_dir()?;
    csv_out::write_summary(&experiment_dir, &graph)?;
    csv_out::write_pio_sets(&experiment_dir, &graph, &fragments)?;
    println!(
        "wrote per-process fragments for {} process(es) to {}",
        fragments.len(),
        experiment_dir.display()
    );
    Ok(())
}

fn run_graph(args: Vec<String>) -> Result<(), String> {
    let mut positionals = Vec::new();
    let mut as_dot = false;
    for arg in args {
        match arg.as_str() {
            "--dot" => as_dot = true,
            "--help" | "-h" => {
                println!("otf2-cio graph <trace-path> [--dot]");
                return Ok(());
            }
            other => positionals.push(other.to_string()),
        }
    }
    let trace_path = positional_trace_path(&positionals, "graph <trace-path> [--dot]")?;
    let graph = build_graph(&trace_path)?;

    if as_dot {
        print!("{}", dot::to_dot(&graph));
    } else {
        let props = graph.properties();
        println!("vertices: {}", graph.vertex_count());
        println!("processes: {}", props.num_locations);
        println!("total_wall_time: {}", props.total_wall_time);
    }
    Ok(())
}

fn positional_trace_path(args: &[String], usage_line: &str) -> Result<PathBuf, String> {
    args.first()
        .map(PathBuf::from)
        .ok_or_else(|| format!("missing <trace-path>\n\notf2-cio {usage_line}"))
}

fn build_graph(trace_path: &Path) -> Result<Graph, String> {
    let mut source = JsonLineTrace::open(trace_path)?;
    build(&mut source, BuilderConfig::default(), &log::TracingLog).map_err(|e| format!("{e}"))
}

fn make_experiment_dir() -> Result<PathBuf, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("current dir: {e}"))?;
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("system clock before epoch: {e}"))?
        .as_secs();
    let dir = cwd.join(format!("rabbitxx-{}", format_experiment_timestamp(unix_secs)));
    std::fs::create_dir_all(&dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
    Ok(dir)
}

/// `YYYY-MM-DD-HH-MM-SS` from a unix timestamp, via Howard Hinnant's
/// days-from-civil algorithm (no calendar crate in the dependency tree).
fn format_experiment_timestamp(unix_secs: u64) -> String {
    let days = (unix_secs / 86_400) as i64;
    let time_of_day = unix_secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    let hour = time_of_day / 3600;
    let minute = (time_of_day % 3600) / 60;
    let second = time_of_day % 60;
    format!("{year:04}-{month:02}-{day:02}-{hour:02}-{minute:02}-{second:02}")
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_timestamp_matches_known_epoch() {
        // 2024-01-02 03:24:05 UTC
        assert_eq!(
            format_experiment_timestamp(1_704_165_845),
            "2024-01-02-03-24-05"
        );
    }

    #[test]
    fn experiment_timestamp_handles_epoch_zero() {
        assert_eq!(format_experiment_timestamp(0), "1970-01-01-00-00-00");
    }
}
