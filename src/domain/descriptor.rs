//! Request descriptor: the normalized tuple that determines cache identity.
//!
//! Every field is validated on construction, so a `RequestDescriptor` that exists is always
//! within bounds and can be turned into a cache key without further checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const MIN_LIMIT: u8 = 1;
pub const MAX_LIMIT: u8 = 100;
pub const DEFAULT_LIMIT: u8 = 10;
const MAX_CHANNEL_LEN: usize = 50;

/// Time window for "top"-style listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        TimeWindow::Hour,
        TimeWindow::Day,
        TimeWindow::Week,
        TimeWindow::Month,
        TimeWindow::Year,
        TimeWindow::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|window| window.as_str() == value)
            .ok_or_else(|| {
                DomainError::validation(
                    "period",
                    format!("`{value}` is not one of hour, day, week, month, year, all"),
                )
            })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::Hot,
        SortOrder::New,
        SortOrder::Top,
        SortOrder::Rising,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Hot => "hot",
            SortOrder::New => "new",
            SortOrder::Top => "top",
            SortOrder::Rising => "rising",
        }
    }

    /// Whether the upstream listing honours a time window for this order.
    pub fn uses_time_window(self) -> bool {
        matches!(self, SortOrder::Top)
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.as_str() == value)
            .ok_or_else(|| {
                DomainError::validation(
                    "sort",
                    format!("`{value}` is not one of hot, new, top, rising"),
                )
            })
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result limit bounded to `[MIN_LIMIT, MAX_LIMIT]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultLimit(u8);

impl ResultLimit {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if !(i64::from(MIN_LIMIT)..=i64::from(MAX_LIMIT)).contains(&value) {
            return Err(DomainError::validation(
                "limit",
                format!("{value} is outside {MIN_LIMIT}..={MAX_LIMIT}"),
            ));
        }
        // Bounds checked above.
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }
}

impl Default for ResultLimit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

impl FromStr for ResultLimit {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed: i64 = value.trim().parse().map_err(|_| {
            DomainError::validation("limit", format!("`{value}` is not an integer"))
        })?;
        Self::new(parsed)
    }
}

impl fmt::Display for ResultLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel identifier, lower-cased.
///
/// Only ASCII letters, digits and `_` are accepted, which keeps the value safe to embed in
/// upstream URL paths and in `:`-separated cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("channel", "must not be empty"));
        }
        if trimmed.len() > MAX_CHANNEL_LEN {
            return Err(DomainError::validation(
                "channel",
                format!("must be at most {MAX_CHANNEL_LEN} characters"),
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DomainError::validation(
                "channel",
                format!("`{trimmed}` may only contain letters, digits and underscores"),
            ));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    channel: ChannelName,
    window: TimeWindow,
    limit: ResultLimit,
    sort: SortOrder,
}

impl RequestDescriptor {
    pub fn new(
        channel: ChannelName,
        window: TimeWindow,
        limit: ResultLimit,
        sort: SortOrder,
    ) -> Self {
        Self {
            channel,
            window,
            limit,
            sort,
        }
    }

    /// Build a descriptor from raw request parameters, applying defaults for absent values.
    pub fn from_params(
        channel: &str,
        window: Option<&str>,
        limit: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Self, DomainError> {
        let channel = ChannelName::parse(channel)?;
        let window = window
            .map(|value| value.trim().to_ascii_lowercase().parse::<TimeWindow>())
            .transpose()?
            .unwrap_or_default();
        let limit = limit
            .map(str::parse::<ResultLimit>)
            .transpose()?
            .unwrap_or_default();
        let sort = sort
            .map(|value| value.trim().to_ascii_lowercase().parse::<SortOrder>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self::new(channel, window, limit, sort))
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn limit(&self) -> ResultLimit {
        self.limit
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }
}
