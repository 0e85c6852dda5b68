// hepctl - CLI for the HEPIC SIP capture and analysis platform
// Copyright (C) 2025 hepctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Request parameters shared by the call, export, and recording commands.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Body shape expected by the search and export endpoints:
/// `{"param": {...}, "timestamp": {"from": <ms>, "to": <ms>}}`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchParams {
    pub param: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl SearchParams {
    fn empty() -> Self {
        Self {
            param: Map::new(),
            timestamp: None,
        }
    }
}

/// Builds the body for the call search endpoints. `from` is required; `to`
/// defaults to now. Call-ID is an exact filter, caller/callee are or-matched
/// against `from_user` / `ruri_user`.
pub fn search_params(
    from: &str,
    to: Option<&str>,
    caller: Option<&str>,
    callee: Option<&str>,
    call_id: Option<&str>,
) -> Result<SearchParams> {
    let mut params = SearchParams::empty();

    let from_ms = parse_time_ms(from).context_invalid("--from")?;
    let to_ms = match to {
        Some(to) => parse_time_ms(to).context_invalid("--to")?,
        None => Utc::now().timestamp_millis(),
    };
    params.timestamp = Some(json!({"from": from_ms, "to": to_ms}));

    let mut search = Map::new();
    let mut orlogic = Map::new();
    if let Some(call_id) = call_id {
        search.insert("callid".into(), json!(call_id));
    }
    if let Some(caller) = caller {
        orlogic.insert("from_user".into(), json!(caller));
    }
    if let Some(callee) = callee {
        orlogic.insert("ruri_user".into(), json!(callee));
    }
    if !search.is_empty() {
        params.param.insert("search".into(), Value::Object(search));
    }
    if !orlogic.is_empty() {
        params.param.insert("orlogic".into(), Value::Object(orlogic));
    }

    Ok(params)
}

/// Builds the body for the export endpoints: a single Call-ID plus an
/// optional time window.
pub fn export_params(from: Option<&str>, to: Option<&str>, call_id: &str) -> Result<SearchParams> {
    let mut params = SearchParams::empty();
    params.param.insert(
        "search".into(),
        json!({"callid": [call_id]}),
    );
    params.timestamp = window(from, to)?;
    Ok(params)
}

/// Builds a body carrying only an optional time window (recording search).
pub fn window_params(from: Option<&str>, to: Option<&str>) -> Result<SearchParams> {
    let mut params = SearchParams::empty();
    params.timestamp = window(from, to)?;
    Ok(params)
}

fn window(from: Option<&str>, to: Option<&str>) -> Result<Option<Value>> {
    let mut ts = Map::new();
    if let Some(from) = from {
        ts.insert("from".into(), json!(parse_time_ms(from).context_invalid("--from")?));
    }
    if let Some(to) = to {
        ts.insert("to".into(), json!(parse_time_ms(to).context_invalid("--to")?));
    }
    Ok(if ts.is_empty() {
        None
    } else {
        Some(Value::Object(ts))
    })
}

/// Parses a point in time as raw unix milliseconds, RFC3339, or a plain
/// `YYYY-MM-DD` date (midnight UTC), returning unix milliseconds.
pub fn parse_time_ms(s: &str) -> Result<i64> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.timestamp_millis());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
    }
    Err(anyhow!(
        "cannot parse {s:?} as RFC3339, YYYY-MM-DD, or unix milliseconds"
    ))
}

trait ContextInvalid<T> {
    fn context_invalid(self, flag: &str) -> Result<T>;
}

impl<T> ContextInvalid<T> for Result<T> {
    fn context_invalid(self, flag: &str) -> Result<T> {
        self.map_err(|err| anyhow!("invalid {flag} value: {err}"))
    }
}
