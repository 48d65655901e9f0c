use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use scribe_core::preflight::{self, write_artifacts, PreflightOptions};
use scribe_core::tuning::ConfigMap;

#[derive(Debug)]
struct Args {
    audio: PathBuf,
    mode: String,
    pre_norm: String,
    cache_ttl: Option<u64>,
    no_cache: bool,
    dump: Option<PathBuf>,
    redact_paths: bool,
    overrides: ConfigMap,
}

fn usage() -> &'static str {
    "Usage: preflight --audio <file.wav> [--mode apply|suggest] [--pre-norm off|suggest|apply] \\
  [--cache-ttl <seconds>] [--no-cache] [--dump <dir>] [--redact-paths] [--set key=<json>]..."
}

fn parse_args() -> Result<Args, String> {
    let mut audio: Option<PathBuf> = None;
    let mut mode = "apply".to_string();
    let mut pre_norm = "suggest".to_string();
    let mut cache_ttl: Option<u64> = None;
    let mut no_cache = false;
    let mut dump: Option<PathBuf> = None;
    let mut redact_paths = false;
    let mut overrides = ConfigMap::new();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--audio" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --audio".into());
                };
                audio = Some(PathBuf::from(v));
            }
            "--mode" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --mode".into());
                };
                mode = v;
            }
            "--pre-norm" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --pre-norm".into());
                };
                pre_norm = v;
            }
            "--cache-ttl" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --cache-ttl".into());
                };
                cache_ttl = Some(
                    v.parse::<u64>()
                        .map_err(|_| "invalid value for --cache-ttl".to_string())?,
                );
            }
            "--no-cache" => no_cache = true,
            "--redact-paths" => redact_paths = true,
            "--dump" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --dump".into());
                };
                dump = Some(PathBuf::from(v));
            }
            "--set" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --set".into());
                };
                let Some((key, raw)) = v.split_once('=') else {
                    return Err(format!("--set expects key=<json>, got '{v}'"));
                };
                // Bare words are taken as strings.
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                overrides.insert(key.to_string(), value);
            }
            "--help" | "-h" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let Some(audio) = audio else {
        return Err(format!("--audio is required\n{}", usage()));
    };
    Ok(Args {
        audio,
        mode,
        pre_norm,
        cache_ttl,
        no_cache,
        dump,
        redact_paths,
        overrides,
    })
}

fn run() -> Result<(), String> {
    let args = parse_args()?;

    let mut options =
        PreflightOptions::from_modes(&args.mode, &args.pre_norm).map_err(|e| e.to_string())?;
    options.overrides = args.overrides;
    options.no_cache = args.no_cache;
    options.artifact_dir = args.dump.clone();
    if let Some(secs) = args.cache_ttl {
        options.cache_ttl = Duration::from_secs(secs);
    }

    let outcome = preflight::preflight(&args.audio, &options).map_err(|e| e.to_string())?;
    let summary = outcome.report.summary();
    tracing::info!(
        snr_db = summary.snr_db,
        micro_ratio = summary.micro_ratio,
        decision = ?summary.decision,
        audio = %outcome.audio_path().display(),
        "preflight summary"
    );

    if let Some(dir) = &args.dump {
        let base = args
            .audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".into());
        let paths = write_artifacts(&outcome.report, dir, &base, args.redact_paths)
            .map_err(|e| format!("failed to write artifacts: {e}"))?;
        tracing::info!(path = %paths.diagnostics.display(), "preflight artifacts written");
    }

    let json = serde_json::to_string_pretty(&outcome.applied_cfg).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scribe_core=info,preflight=info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("preflight failed: {e}");
            ExitCode::FAILURE
        }
    }
}
