//! Report replay tool
//!
//! Feeds recorded sensor reports into a running gateway, one JSON object per
//! line, and splits mixed recordings into per-type files.
//!
//! ```text
//! replay send <file.jsonl>...
//! replay split <mixed.jsonl> <out_dir>
//! ```
//!
//! The target gateway is taken from `REPLAY_TARGET` (default
//! `http://localhost:8080`).

use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_TARGET: &str = "http://localhost:8080";
const REPORT_PATH: &str = "/api/report";

#[derive(Debug, Error)]
enum ReplayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Usage: {0}")]
    Usage(String),
}

type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(Vec<PathBuf>),
    Split { input: PathBuf, out_dir: PathBuf },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args {
            [cmd, files @ ..] if cmd == "send" && !files.is_empty() => {
                Ok(Command::Send(files.iter().map(PathBuf::from).collect()))
            }
            [cmd, input, out_dir] if cmd == "split" => Ok(Command::Split {
                input: PathBuf::from(input),
                out_dir: PathBuf::from(out_dir),
            }),
            _ => Err(ReplayError::Usage(
                "replay send <file.jsonl>... | replay split <mixed.jsonl> <out_dir>".to_string(),
            )),
        }
    }
}

/// Outcome of replaying one file
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    accepted: usize,
    rejected: usize,
    skipped: usize,
}

struct Replayer {
    client: Client,
    endpoint: String,
}

impl Replayer {
    fn new(target: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", target.trim_end_matches('/'), REPORT_PATH),
        })
    }

    /// Post every report in `contents` in order
    async fn replay(&self, contents: &str) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let report: Value = match serde_json::from_str(line) {
                Ok(report) => report,
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping unparseable line");
                    summary.skipped += 1;
                    continue;
                }
            };

            let response = self.client.post(&self.endpoint).json(&report).send().await?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.is_success() {
                info!(line = line_no + 1, status = status.as_u16(), response = %body, "Report sent");
                summary.accepted += 1;
            } else {
                warn!(line = line_no + 1, status = status.as_u16(), response = %body, "Report rejected");
                summary.rejected += 1;
            }
        }

        Ok(summary)
    }
}

/// Reports of a mixed recording grouped by their `type` tag
#[derive(Debug, Default)]
struct SplitFeed {
    aqi: Vec<String>,
    water: Vec<String>,
    /// `traffic` and any other tag
    traffic: Vec<String>,
    skipped: usize,
}

fn split_feed(contents: &str) -> SplitFeed {
    let mut split = SplitFeed::default();

    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let report: Value = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(_) => {
                split.skipped += 1;
                continue;
            }
        };

        let bucket = match report.get("type").and_then(Value::as_str) {
            Some("AQI") => &mut split.aqi,
            Some("water") => &mut split.water,
            _ => &mut split.traffic,
        };
        bucket.push(report.to_string());
    }

    split
}

async fn write_split(input: &Path, out_dir: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(input).await?;
    let split = split_feed(&contents);

    tokio::fs::create_dir_all(out_dir).await?;
    for (name, lines) in [
        ("aqi.jsonl", &split.aqi),
        ("water.jsonl", &split.water),
        ("traffic.jsonl", &split.traffic),
    ] {
        tokio::fs::write(out_dir.join(name), lines.join("\n")).await?;
        info!(file = name, reports = lines.len(), "Wrote split file");
    }

    if split.skipped > 0 {
        warn!(skipped = split.skipped, "Unparseable lines left out of the split");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    surge_telemetry::init("replay")?;

    let args: Vec<String> = std::env::args().skip(1).collect();

    match Command::parse(&args)? {
        Command::Send(files) => {
            let target = std::env::var("REPLAY_TARGET").unwrap_or_else(|_| DEFAULT_TARGET.to_string());
            let replayer = Replayer::new(&target)?;

            for file in files {
                let contents = tokio::fs::read_to_string(&file).await?;
                let summary = replayer.replay(&contents).await?;
                info!(
                    file = %file.display(),
                    accepted = summary.accepted,
                    rejected = summary.rejected,
                    skipped = summary.skipped,
                    "Replay finished"
                );
            }
        }
        Command::Split { input, out_dir } => write_split(&input, &out_dir).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    const MIXED: &str = r#"{"type":"AQI","value":88,"locality":{"name":"Hebbal"}}
{"type":"water","value":7.2,"locality":{"name":"Hebbal"}}

{"type":"traffic","value":3,"locality":{"name":"Hebbal"}}
not json
{"type":"AQI","value":91,"locality":{"name":"Yelahanka"}}
"#;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn accept_aqi(State(received): State<Received>, Json(report): Json<Value>) -> StatusCode {
        let is_aqi = report["type"] == "AQI";
        received.lock().unwrap().push(report);
        if is_aqi {
            StatusCode::CREATED
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }

    async fn gateway() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route(REPORT_PATH, post(accept_aqi))
            .with_state(received.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/", addr), received)
    }

    #[test]
    fn test_parse_commands() {
        let args = |s: &[&str]| s.iter().map(|a| a.to_string()).collect::<Vec<_>>();

        assert_eq!(
            Command::parse(&args(&["send", "aqi.jsonl", "water.jsonl"])).unwrap(),
            Command::Send(vec![PathBuf::from("aqi.jsonl"), PathBuf::from("water.jsonl")])
        );
        assert_eq!(
            Command::parse(&args(&["split", "all.jsonl", "out"])).unwrap(),
            Command::Split {
                input: PathBuf::from("all.jsonl"),
                out_dir: PathBuf::from("out"),
            }
        );
        assert!(matches!(Command::parse(&args(&["send"])), Err(ReplayError::Usage(_))));
        assert!(matches!(Command::parse(&args(&[])), Err(ReplayError::Usage(_))));
    }

    #[test]
    fn test_split_by_type() {
        let split = split_feed(MIXED);

        assert_eq!(split.aqi.len(), 2);
        assert_eq!(split.water.len(), 1);
        assert_eq!(split.traffic.len(), 1);
        assert_eq!(split.skipped, 1);

        let first: Value = serde_json::from_str(&split.aqi[0]).unwrap();
        assert_eq!(first["locality"]["name"], "Hebbal");
    }

    #[tokio::test]
    async fn test_replay_posts_reports_in_order() {
        let (target, received) = gateway().await;
        let replayer = Replayer::new(&target).unwrap();

        let summary = replayer.replay(MIXED).await.unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                accepted: 2,
                rejected: 2,
                skipped: 1,
            }
        );
        let types: Vec<_> = received
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(types, ["AQI", "water", "traffic", "AQI"]);
    }
}
