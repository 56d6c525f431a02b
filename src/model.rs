use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One bar of aggregated trading data.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceChartDataPoint {
    pub timestamp: Option<DateTime<Utc>>, // Start of the bucket, None when the date did not parse.
    pub open: f64,                        // Opening price.
    pub high: f64,                        // Highest price.
    pub low: f64,                         // Lowest price.
    pub close: f64,                       // Closing price.
    pub turnover: f64,                    // Traded volume in the base asset.
}

/// Calendar granularity used both for the look-back window and for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hour,
    Day,
    Week,
    Month,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
        }
    }
}

impl Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the chart groups its bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupMode {
    ByMonth,
    ByWeek,
    ByDay,
    ByHour,
}

impl GroupMode {
    /// Calendar unit a bar of this mode spans.
    pub fn unit(&self) -> IntervalUnit {
        match self {
            GroupMode::ByMonth => IntervalUnit::Month,
            GroupMode::ByWeek => IntervalUnit::Week,
            GroupMode::ByDay => IntervalUnit::Day,
            GroupMode::ByHour => IntervalUnit::Hour,
        }
    }

    /// chrono format string for axis labels.
    pub fn format(&self) -> &'static str {
        match self {
            GroupMode::ByMonth => "%y-%m",
            GroupMode::ByWeek | GroupMode::ByDay => "%m-%d",
            GroupMode::ByHour => "%H:%M",
        }
    }

    pub fn label<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        timestamp.format(self.format()).to_string()
    }
}

/// A market identified by its base and quote symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        TradingPair {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Filter key used by the data service.
    pub fn market(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Ok(TradingPair::new(base.trim(), quote.trim()))
            }
            _ => Err(format!("expected BASE/QUOTE, got '{}'", s)),
        }
    }
}

impl Display for TradingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// When an announcement is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Visibility {
    // Never shown, the next view is rendered straight away.
    None,
    // Shown until dismissed once, the dismissal is persisted.
    Once,
    // Shown on every fresh instance.
    Always,
}
