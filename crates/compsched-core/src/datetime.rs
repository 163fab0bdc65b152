use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::anyhow;
use chrono::format::{
  Item,
  StrftimeItems
};
use chrono::{
  DateTime,
  FixedOffset,
  Local,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "compsched-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "COMPSCHED_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "COMPSCHED_TIME_CONFIG";

pub const DEFAULT_LABEL_FORMAT: &str =
  "%A, %B %-d, %Y";
pub const DEFAULT_TIME_FORMAT: &str =
  "%H:%M";
pub const INVALID_DATE_LABEL: &str =
  "Invalid Date";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone attached to a leaf activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
  Named(Tz),
  /// No venue supplied a usable zone; formatting uses the labeler's
  /// fallback.
  Unspecified
}

impl Zone {
  /// IANA name, empty when unspecified.
  pub fn name(&self) -> &'static str {
    match self {
      | Zone::Named(tz) => tz.name(),
      | Zone::Unspecified => ""
    }
  }
}

/// Pinned formatting policy for day labels and clock times.
///
/// Day grouping compares labels as strings, so the format is fixed by
/// configuration and never read from the host locale. chrono renders
/// weekday and month names in English.
#[derive(Debug, Clone)]
pub struct DateLabeler {
  label_format: String,
  time_format:  String,
  fallback:     Option<Tz>
}

impl Default for DateLabeler {
  fn default() -> Self {
    Self {
      label_format: DEFAULT_LABEL_FORMAT
        .to_string(),
      time_format:  DEFAULT_TIME_FORMAT
        .to_string(),
      fallback:     None
    }
  }
}

impl DateLabeler {
  pub fn new(
    label_format: &str,
    time_format: &str,
    fallback: Option<Tz>
  ) -> anyhow::Result<Self> {
    validate_format(
      label_format,
      "label.format"
    )?;
    validate_format(
      time_format,
      "time.format"
    )?;
    Ok(Self {
      label_format: label_format
        .to_string(),
      time_format: time_format
        .to_string(),
      fallback
    })
  }

  #[must_use]
  pub fn with_fallback(
    mut self,
    fallback: Option<Tz>
  ) -> Self {
    self.fallback = fallback;
    self
  }

  pub fn fallback(&self) -> Option<Tz> {
    self.fallback
  }

  /// Wall-clock view of `instant` in `zone`. Unspecified zones use the
  /// configured fallback, else the system local zone.
  pub fn localize(
    &self,
    instant: DateTime<Utc>,
    zone: Zone
  ) -> DateTime<FixedOffset> {
    match (zone, self.fallback) {
      | (Zone::Named(tz), _)
      | (Zone::Unspecified, Some(tz)) => {
        instant
          .with_timezone(&tz)
          .fixed_offset()
      }
      | (Zone::Unspecified, None) => {
        instant
          .with_timezone(&Local)
          .fixed_offset()
      }
    }
  }

  pub fn date_label(
    &self,
    instant: Option<DateTime<Utc>>,
    zone: Zone
  ) -> String {
    match instant {
      | Some(instant) => {
        self
          .localize(instant, zone)
          .format(&self.label_format)
          .to_string()
      }
      | None => {
        INVALID_DATE_LABEL.to_string()
      }
    }
  }

  pub fn clock(
    &self,
    instant: Option<DateTime<Utc>>,
    zone: Zone
  ) -> String {
    match instant {
      | Some(instant) => {
        self
          .localize(instant, zone)
          .format(&self.time_format)
          .to_string()
      }
      | None => {
        INVALID_DATE_LABEL.to_string()
      }
    }
  }
}

fn validate_format(
  fmt: &str,
  key: &str
) -> anyhow::Result<()> {
  if fmt.trim().is_empty() {
    return Err(anyhow!(
      "{key} cannot be empty"
    ));
  }
  if StrftimeItems::new(fmt)
    .any(|item| {
      matches!(item, Item::Error)
    })
  {
    return Err(anyhow!(
      "invalid {key} format string: \
       {fmt}"
    ));
  }
  Ok(())
}

/// Parses a WCIF instant (RFC 3339). `None` marks an invalid instant.
pub fn parse_instant(
  raw: &str
) -> Option<DateTime<Utc>> {
  match DateTime::parse_from_rfc3339(
    raw.trim()
  ) {
    | Ok(dt) => {
      Some(dt.with_timezone(&Utc))
    }
    | Err(err) => {
      tracing::warn!(
        instant = %raw,
        error = %err,
        "invalid activity instant"
      );
      None
    }
  }
}

/// Fallback zone from `COMPSCHED_TIMEZONE` or the time config file.
pub fn resolve_fallback_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return Some(tz);
  }

  timezone_config_path().and_then(
    |path| load_timezone_from_file(&path)
  )
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::debug!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "parsed timezone id"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}
