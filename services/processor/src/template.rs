//! Source URL templates.
//!
//! `{ts:<strftime>}` is replaced by the granule time formatted with the given
//! pattern, e.g. `Flood_byStor_{ts:%Y%m%d%H}.bin`.

use std::fmt::Write;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

const OPEN: &str = "{ts:";

/// Render `template` for the granule at `ts`.
pub fn render_url(template: &str, ts: DateTime<Utc>) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find('}') else {
            bail!("Unterminated placeholder in URL template '{}'", template);
        };
        let pattern = &after[..end];
        if write!(out, "{}", ts.format(pattern)).is_err() {
            bail!("Invalid time format '{}' in URL template '{}'", pattern, template);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
