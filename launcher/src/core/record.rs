//! The administrative record: a durable ledger of test-cycle state.
//!
//! One JSON document per managed repository tracks where the repository is
//! in its test lifecycle. The launcher process does not survive across CI
//! invocations; the record does, so every multi-invocation operation is
//! expressed as record state and re-derived on the next tick.
//!
//! On disk every instant is stored twice: `<field>_datetime` (RFC 3339)
//! and `<field>_timestamp` (POSIX seconds). The pair is kept numerically
//! consistent at every save; epoch zero is the "never happened / still in
//! progress" sentinel. In memory only the `DateTime<Utc>` form exists.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// `owner/name` of the managed repository, derived from the git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    pub owner: String,
    pub name: String,
}

impl RepoIdentity {
    /// The `owner/name` slug recorded in the `repo` field.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// In-memory form of the administrative record.
///
/// Unknown on-disk fields survive in `extra` so a newer launcher version
/// can add fields without older versions dropping them.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// True between begin-or-continue and finalize.
    pub currently_under_test: bool,
    /// Cooldown between cycles, in days. `<= 0` disables the cooldown.
    pub days_until_next_test: f64,
    /// When the current (or last) cycle began.
    pub start: DateTime<Utc>,
    /// When the last cycle fully completed. Epoch zero while in progress.
    pub finish: DateTime<Utc>,
    /// When the current CI invocation's part began.
    pub latest_part_start: DateTime<Utc>,
    /// When the current part ended. Epoch zero while a part is running.
    pub latest_part_finish: DateTime<Utc>,
    /// When the input list was last refreshed from `raw_link`.
    pub last_download: DateTime<Utc>,
    /// Upstream URL of the list to test. `None` means "use the local copy".
    pub raw_link: Option<String>,
    /// Repository name, recomputed from the git remote on every load.
    pub name: String,
    /// `owner/name` slug, recomputed from the git remote on every load.
    pub repo: String,
    /// Usernames to mention in generated commit messages.
    pub ping: Vec<String>,
    /// When true the launcher must not overwrite locally-managed
    /// configuration files.
    pub own_management: bool,
    /// Demand a refresh of the input source on every part.
    pub live_update: bool,
    /// Free-form overrides merged into the generated tester configuration.
    pub custom_tester_config: Map<String, Value>,
    /// Unknown fields preserved verbatim across load/persist cycles.
    pub extra: BTreeMap<String, Value>,
}

/// The epoch-zero sentinel.
pub fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Whether an instant is the epoch-zero sentinel.
pub fn is_epoch(instant: DateTime<Utc>) -> bool {
    instant == DateTime::UNIX_EPOCH
}

/// Truncate an instant to whole seconds.
///
/// The on-disk mirrors carry second precision only; truncating at intake
/// keeps `persist(load(persist(r)))` lossless.
pub fn to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Fields a previous launcher version wrote that are no longer used.
/// Stripped on every load so the on-disk shape converges.
const DEPRECATED_FIELDS: [&str; 7] = [
    "arguments",
    "clean_list_file",
    "clean_original",
    "commit_autosave_message",
    "last_test",
    "list_name",
    "stable",
];

/// Default cooldown for repositories that never configured one.
const DEFAULT_COOLDOWN_DAYS: f64 = 2.0;

impl Record {
    /// A fully defaulted record for a repository with no on-disk document.
    ///
    /// Instants default to 15 days in the past so a brand-new repository
    /// is due immediately under the default 2-day cooldown.
    pub fn defaulted(now: DateTime<Utc>, identity: &RepoIdentity) -> Self {
        let default_instant = to_second(now) - Duration::days(15);
        Self {
            currently_under_test: false,
            days_until_next_test: DEFAULT_COOLDOWN_DAYS,
            start: default_instant,
            finish: default_instant,
            latest_part_start: default_instant,
            latest_part_finish: default_instant,
            last_download: default_instant,
            raw_link: None,
            name: identity.name.clone(),
            repo: identity.slug(),
            ping: Vec::new(),
            own_management: false,
            live_update: true,
            custom_tester_config: Map::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Normalize a parsed on-disk document into a record.
    ///
    /// Lazy migration: every recognized field missing from `value` gets its
    /// documented default; deprecated fields are dropped; everything else is
    /// preserved in `extra`.
    pub fn from_value(value: Value, now: DateTime<Utc>, identity: &RepoIdentity) -> Self {
        let mut fields = match value {
            Value::Object(map) => map,
            // Anything but an object is treated as an empty document. The
            // store rejects unparsable files before this point.
            _ => Map::new(),
        };

        let mut record = Self::defaulted(now, identity);

        if let Some(flag) = take_bool(&mut fields, "currently_under_test") {
            record.currently_under_test = flag;
        }
        if let Some(days) = take_f64(&mut fields, "days_until_next_test") {
            record.days_until_next_test = days;
        }
        if let Some(instant) = take_instant(&mut fields, "start") {
            record.start = instant;
        }
        if let Some(instant) = take_instant(&mut fields, "finish") {
            record.finish = instant;
        }
        if let Some(instant) = take_instant(&mut fields, "latest_part_start") {
            record.latest_part_start = instant;
        }
        if let Some(instant) = take_instant(&mut fields, "latest_part_finish") {
            record.latest_part_finish = instant;
        }
        if let Some(instant) = take_instant(&mut fields, "last_download") {
            record.last_download = instant;
        }
        if let Some(link) = fields.remove("raw_link") {
            // Empty strings are not accepted; they mean "no upstream".
            record.raw_link = match link {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            };
        }
        if let Some(Value::Array(entries)) = fields.remove("ping") {
            record.ping = entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::String(s) => Some(normalize_mention(&s)),
                    _ => None,
                })
                .collect();
        }
        if let Some(flag) = take_bool(&mut fields, "own_management") {
            record.own_management = flag;
        }
        if let Some(flag) = take_bool(&mut fields, "live_update") {
            record.live_update = flag;
        }
        if let Some(Value::Object(map)) = fields.remove("custom_tester_config") {
            record.custom_tester_config = map;
        }

        // `name` and `repo` are always recomputed, never user-editable.
        fields.remove("name");
        fields.remove("repo");

        for field in DEPRECATED_FIELDS {
            if fields.remove(field).is_some() {
                tracing::debug!(field, "dropped deprecated record field");
            }
        }

        record.extra = fields.into_iter().collect();
        record
    }

    /// Serialize to the on-disk document shape, emitting both mirror forms
    /// of every instant field.
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(
            "currently_under_test".to_string(),
            Value::Bool(self.currently_under_test),
        );
        fields.insert(
            "days_until_next_test".to_string(),
            json_f64(self.days_until_next_test),
        );
        for (field, instant) in self.instants() {
            fields.insert(
                format!("{field}_datetime"),
                Value::String(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
            fields.insert(
                format!("{field}_timestamp"),
                json_f64(instant.timestamp() as f64),
            );
        }
        fields.insert(
            "raw_link".to_string(),
            match &self.raw_link {
                Some(link) => Value::String(link.clone()),
                None => Value::Null,
            },
        );
        fields.insert("name".to_string(), Value::String(self.name.clone()));
        fields.insert("repo".to_string(), Value::String(self.repo.clone()));
        fields.insert(
            "ping".to_string(),
            Value::Array(self.ping.iter().cloned().map(Value::String).collect()),
        );
        fields.insert("own_management".to_string(), Value::Bool(self.own_management));
        fields.insert("live_update".to_string(), Value::Bool(self.live_update));
        fields.insert(
            "custom_tester_config".to_string(),
            Value::Object(self.custom_tester_config.clone()),
        );
        for (key, value) in &self.extra {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(fields)
    }

    /// The string appended to commit messages to mention the ping users.
    pub fn ping_mentions(&self) -> String {
        self.ping.join(" ")
    }

    /// The mirror-pair instant fields with their on-disk base names.
    fn instants(&self) -> [(&'static str, DateTime<Utc>); 5] {
        [
            ("start", self.start),
            ("finish", self.finish),
            ("latest_part_start", self.latest_part_start),
            ("latest_part_finish", self.latest_part_finish),
            ("last_download", self.last_download),
        ]
    }
}

/// Mentions always carry the `@` prefix so generated commit messages ping.
fn normalize_mention(username: &str) -> String {
    if username.starts_with('@') {
        username.to_string()
    } else {
        format!("@{username}")
    }
}

fn take_bool(fields: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match fields.remove(key)? {
        Value::Bool(flag) => Some(flag),
        // Older documents stored 0/1.
        Value::Number(n) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
        _ => None,
    }
}

fn take_f64(fields: &mut Map<String, Value>, key: &str) -> Option<f64> {
    match fields.remove(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Resolve a mirror pair, preferring the RFC 3339 form over the POSIX one.
fn take_instant(fields: &mut Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    let datetime = fields.remove(&format!("{field}_datetime"));
    let timestamp = fields.remove(&format!("{field}_timestamp"));

    if let Some(Value::String(text)) = &datetime {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(to_second(parsed.with_timezone(&Utc)));
        }
    }
    if let Some(Value::Number(n)) = &timestamp {
        if let Some(seconds) = n.as_f64() {
            return DateTime::from_timestamp(seconds as i64, 0);
        }
    }
    // A pair that was present but unusable falls back to the sentinel, so a
    // half-written document cannot resurrect a stale instant.
    if datetime.is_some() || timestamp.is_some() {
        return Some(epoch());
    }
    None
}

fn json_f64(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
