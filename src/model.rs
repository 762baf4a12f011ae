use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Marker sent to log followers once the run has been finalized.
pub const DONE_SENTINEL: &str = "__DONE__";

/// Number of trailing log lines included in a status snapshot.
pub const STATUS_LOG_TAIL: usize = 100;

/// Parameters for one simulation run.
///
/// Scalars are kept as the text that goes into the command script, so `"1.5"` and `1.5`
/// are both accepted from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunParams {
    pub geometry: String,
    pub particle: String,
    #[serde(deserialize_with = "string_or_number")]
    pub energy: String,
    pub energy_unit: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pos_x: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pos_y: String,
    #[serde(deserialize_with = "string_or_number")]
    pub pos_z: String,
    pub pos_unit: String,
    #[serde(deserialize_with = "string_or_number")]
    pub dir_x: String,
    #[serde(deserialize_with = "string_or_number")]
    pub dir_y: String,
    #[serde(deserialize_with = "string_or_number")]
    pub dir_z: String,
    #[serde(deserialize_with = "count_from_string_or_number")]
    pub n_events: u64,
    pub output_file: String,
    #[serde(deserialize_with = "string_or_number")]
    pub verbose_hits: String,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            geometry: "geometry.json".into(),
            particle: "gamma".into(),
            energy: "1".into(),
            energy_unit: "MeV".into(),
            pos_x: "-10".into(),
            pos_y: "0".into(),
            pos_z: "0".into(),
            pos_unit: "cm".into(),
            dir_x: "1".into(),
            dir_y: "0".into(),
            dir_z: "0".into(),
            n_events: 10_000,
            output_file: "G4sim.root".into(),
            verbose_hits: "0".into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

fn count_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = string_or_number(deserializer)?;
    parse_count(text.trim())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid event count: {text}")))
}

// Whole numbers written as floats ("1e4", "10000.0") are accepted too.
fn parse_count(text: &str) -> Option<u64> {
    if let Ok(n) = text.parse::<u64>() {
        return Some(n);
    }
    let f = text.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

impl RunParams {
    /// Engine command script: geometry, output, initialization and gun setup, then beamOn.
    pub fn command_script(&self, run_dir: &Path) -> String {
        format!(
            "/detector/setGeometryFile config/{geometry}\n\
             /output/setFileName {run_dir}/{output}\n\
             /run/initialize\n\
             /vis/disable\n\
             /hits/setVerbose {verbose}\n\
             \n\
             /gun/particle {particle}\n\
             /gun/energy {energy} {energy_unit}\n\
             /gun/position {px} {py} {pz} {pos_unit}\n\
             /gun/direction {dx} {dy} {dz}\n\
             \n\
             /run/beamOn {events}\n",
            geometry = self.geometry,
            run_dir = run_dir.display(),
            output = self.output_file,
            verbose = self.verbose_hits,
            particle = self.particle,
            energy = self.energy,
            energy_unit = self.energy_unit,
            px = self.pos_x,
            py = self.pos_y,
            pz = self.pos_z,
            pos_unit = self.pos_unit,
            dx = self.dir_x,
            dy = self.dir_y,
            dz = self.dir_z,
            events = self.n_events,
        )
    }

    /// Initial record for a run that is about to launch.
    pub fn record(&self, run_id: &str, started: &str) -> RunRecord {
        RunRecord {
            run_id: Some(run_id.to_string()),
            started: started.to_string(),
            geometry: self.geometry.clone(),
            particle: self.particle.clone(),
            energy: format!("{} {}", self.energy, self.energy_unit),
            position: format!(
                "{} {} {} {}",
                self.pos_x, self.pos_y, self.pos_z, self.pos_unit
            ),
            direction: format!("{} {} {}", self.dir_x, self.dir_y, self.dir_z),
            n_events: self.n_events,
            output_file: self.output_file.clone(),
            status: RunStatus::Running,
            finished: None,
        }
    }
}

/// Persisted metadata of one run (`meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub started: String,
    pub geometry: String,
    pub particle: String,
    pub energy: String,
    pub position: String,
    pub direction: String,
    pub n_events: u64,
    pub output_file: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
}

/// Lifecycle state of a run as stored in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Non-zero exit; signal terminations carry the negated signal number.
    Failed { code: i32 },
}

impl RunStatus {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            RunStatus::Completed
        } else {
            RunStatus::Failed { code }
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => f.write_str("running"),
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Failed { code } => write!(f, "error (code {code})"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            other => other
                .strip_prefix("error (code ")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|code| code.trim().parse().ok())
                .map(|code| RunStatus::Failed { code })
                .ok_or_else(|| format!("unknown run status: {other}")),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub running: bool,
    #[serde(flatten)]
    pub session: Option<SessionSnapshot>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self {
            running: false,
            session: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub meta: RunRecord,
    pub log_tail: Vec<String>,
    pub log_length: usize,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Killed,
}

impl StopOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StopOutcome::NotRunning => "no simulation running",
            StopOutcome::Killed => "killed",
        }
    }
}

/// Item delivered to log followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Line(String),
    Done,
}

impl LogEvent {
    /// Text form used on line-oriented transports.
    pub fn as_wire(&self) -> &str {
        match self {
            LogEvent::Line(line) => line,
            LogEvent::Done => DONE_SENTINEL,
        }
    }
}

/// Local wall-clock time as `YYYYMMDD_HHMMSS`, falling back to UTC when the local offset
/// cannot be determined.
pub fn timestamp_now() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_accept_strings_and_numbers() {
        let p: RunParams = serde_json::from_value(json!({
            "particle": "neutron",
            "energy": 2.5,
            "posX": "-20",
            "nEvents": "500",
        }))
        .unwrap();
        assert_eq!(p.particle, "neutron");
        assert_eq!(p.energy, "2.5");
        assert_eq!(p.pos_x, "-20");
        assert_eq!(p.n_events, 500);
        assert_eq!(p.geometry, "geometry.json");
        assert_eq!(p.output_file, "G4sim.root");
    }

    #[test]
    fn bad_event_count_is_rejected() {
        for bad in [json!("lots"), json!(2.5), json!("-3"), json!(-1.0)] {
            let r: Result<RunParams, _> = serde_json::from_value(json!({ "nEvents": bad }));
            assert!(r.is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn whole_float_event_counts_are_accepted() {
        for ok in [json!(1e4), json!("10000.0"), json!(" 1e4 ")] {
            let p: RunParams = serde_json::from_value(json!({ "nEvents": ok })).unwrap();
            assert_eq!(p.n_events, 10_000);
        }
    }

    #[test]
    fn command_script_orders_directives() {
        let p = RunParams::default();
        let script = p.command_script(Path::new("/runs/20250101_120000"));
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "/detector/setGeometryFile config/geometry.json");
        assert_eq!(lines[1], "/output/setFileName /runs/20250101_120000/G4sim.root");
        assert_eq!(lines[2], "/run/initialize");
        assert_eq!(lines[4], "/hits/setVerbose 0");
        assert_eq!(lines[7], "/gun/energy 1 MeV");
        assert_eq!(lines[8], "/gun/position -10 0 0 cm");
        assert_eq!(lines[9], "/gun/direction 1 0 0");
        assert_eq!(*lines.last().unwrap(), "/run/beamOn 10000");
    }

    #[test]
    fn status_text_forms() {
        assert_eq!(RunStatus::Running.to_string(), "running");
        assert_eq!(RunStatus::from_exit_code(0), RunStatus::Completed);
        let failed = RunStatus::from_exit_code(3);
        assert_eq!(failed.to_string(), "error (code 3)");
        assert_eq!("error (code -9)".parse::<RunStatus>(), Ok(RunStatus::Failed { code: -9 }));
        assert!("exploded".parse::<RunStatus>().is_err());
    }

    #[test]
    fn record_json_shape() {
        let rec = RunParams::default().record("20250101_120000", "20250101_120000");
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["status"], "running");
        assert_eq!(v["nEvents"], 10_000);
        assert_eq!(v["energy"], "1 MeV");
        assert_eq!(v["outputFile"], "G4sim.root");
        assert!(v.get("finished").is_none());
        let back: RunRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn idle_status_serializes_flat() {
        let v = serde_json::to_value(StatusSnapshot::idle()).unwrap();
        assert_eq!(v, json!({ "running": false }));
    }

    #[test]
    fn timestamp_has_second_resolution_format() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
        assert!(ts.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }
}
