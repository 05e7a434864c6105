// Classification of streamed script output for log views
use serde::{Deserialize, Serialize};

/// What a single streamed output line asks the log view to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLine {
    /// `progress:[current/total]`; a negative current means indeterminate
    Progress { current: i64, total: i64 },
    /// `@img:/path/to/image`
    Image { path: String },
    Text(String),
}

/// Classify one line of script output
pub fn classify_log_line(line: &str) -> LogLine {
    let log = line.trim();

    if let Some((current, total)) = parse_progress(log) {
        return LogLine::Progress { current, total };
    }

    if let Some(path) = log.strip_prefix("@img:") {
        return LogLine::Image {
            path: path.trim().to_string(),
        };
    }

    LogLine::Text(line.to_string())
}

fn parse_progress(log: &str) -> Option<(i64, i64)> {
    let values = log.strip_prefix("progress:[")?.strip_suffix(']')?;
    let (current, total) = values.split_once('/')?;
    Some((current.trim().parse().ok()?, total.trim().parse().ok()?))
}
