//! Built-in local handlers: time, date, arithmetic and unit conversion

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

use super::{CommandHandler, CommandResult};

/// Source of the current local time
pub type Clock = fn() -> DateTime<Local>;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(time|clock)\b").expect("valid regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(date|today)\b|\bwhat day\b").expect("valid regex")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?").expect("valid regex")
});

const MATH_FAILURE: &str = "I couldn't understand that calculation. Please try rephrasing.";
const CONVERSION_FAILURE: &str = "I couldn't understand that conversion. Please try rephrasing.";

/// Answers "what time is it"
#[derive(Debug, Clone, Copy)]
pub struct TimeHandler {
    clock: Clock,
}

impl TimeHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Local::now)
    }

    #[must_use]
    pub const fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for TimeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for TimeHandler {
    fn can_handle(&self, text: &str) -> bool {
        TIME_RE.is_match(&text.to_lowercase())
    }

    fn handle(&self, _text: &str) -> CommandResult {
        let now = (self.clock)();
        CommandResult::ok(
            self.command_type(),
            format!("The time is {}", now.format("%I:%M %p")),
        )
        .with_metadata(serde_json::json!({ "timestamp": now.to_rfc3339() }))
    }

    fn command_type(&self) -> &'static str {
        "time"
    }
}

/// Answers "what's the date"
#[derive(Debug, Clone, Copy)]
pub struct DateHandler {
    clock: Clock,
}

impl DateHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Local::now)
    }

    #[must_use]
    pub const fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for DateHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for DateHandler {
    fn can_handle(&self, text: &str) -> bool {
        DATE_RE.is_match(&text.to_lowercase())
    }

    fn handle(&self, _text: &str) -> CommandResult {
        let now = (self.clock)();
        CommandResult::ok(
            self.command_type(),
            format!("Today is {}", now.format("%A, %B %d, %Y")),
        )
        .with_metadata(serde_json::json!({ "date": now.date_naive().to_string() }))
    }

    fn command_type(&self) -> &'static str {
        "date"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Detect the operation, checked in add/subtract/multiply/divide order
    fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        let has_word = |words: &[&str]| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| words.contains(&token))
        };

        if has_word(&["plus", "add"]) || lower.contains('+') {
            Some(Self::Add)
        } else if has_word(&["minus", "subtract"]) || lower.contains(" - ") {
            Some(Self::Subtract)
        } else if has_word(&["times", "multiply", "multiplied", "x"])
            || lower.contains('*')
            || lower.contains('×')
        {
            Some(Self::Multiply)
        } else if has_word(&["divided", "divide"]) || lower.contains('/') || lower.contains('÷') {
            Some(Self::Divide)
        } else {
            None
        }
    }

    const fn spoken(self) -> &'static str {
        match self {
            Self::Add => "plus",
            Self::Subtract => "minus",
            Self::Multiply => "times",
            Self::Divide => "divided by",
        }
    }
}

/// Two-operand arithmetic ("what is 6 times 7")
#[derive(Debug, Clone, Copy, Default)]
pub struct MathHandler;

impl MathHandler {
    fn calculate(text: &str) -> Option<String> {
        let numbers: Vec<f64> = NUMBER_RE
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let &[a, b, ..] = numbers.as_slice() else {
            return None;
        };

        let operation = Operation::detect(text)?;
        let result = match operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide if b == 0.0 => return None,
            Operation::Divide => a / b,
        };

        Some(format!(
            "{} {} {} equals {}",
            format_number(a),
            operation.spoken(),
            format_number(b),
            format_number(result)
        ))
    }
}

impl CommandHandler for MathHandler {
    fn can_handle(&self, text: &str) -> bool {
        NUMBER_RE.is_match(text) && Operation::detect(text).is_some()
    }

    fn handle(&self, text: &str) -> CommandResult {
        Self::calculate(text).map_or_else(
            || {
                CommandResult::failed(self.command_type(), MATH_FAILURE)
                    .with_metadata(serde_json::json!({ "original_query": text }))
            },
            |answer| {
                CommandResult::ok(self.command_type(), answer)
                    .with_metadata(serde_json::json!({ "original_query": text }))
            },
        )
    }

    fn command_type(&self) -> &'static str {
        "math"
    }
}

/// A pair of units converted in either direction
struct UnitPair {
    /// Substring identifying the first unit
    first: &'static str,
    /// Substring identifying the second unit
    second: &'static str,
    first_name: &'static str,
    second_name: &'static str,
    forward: fn(f64) -> f64,
    backward: fn(f64) -> f64,
    decimals: usize,
}

const UNIT_PAIRS: &[UnitPair] = &[
    UnitPair {
        first: "fahrenheit",
        second: "celsius",
        first_name: "degrees Fahrenheit",
        second_name: "degrees Celsius",
        forward: fahrenheit_to_celsius,
        backward: celsius_to_fahrenheit,
        decimals: 1,
    },
    UnitPair {
        first: "feet",
        second: "meter",
        first_name: "feet",
        second_name: "meters",
        forward: feet_to_meters,
        backward: meters_to_feet,
        decimals: 2,
    },
    UnitPair {
        first: "mile",
        second: "kilometer",
        first_name: "miles",
        second_name: "kilometers",
        forward: miles_to_kilometers,
        backward: kilometers_to_miles,
        decimals: 2,
    },
    UnitPair {
        first: "pound",
        second: "kilogram",
        first_name: "pounds",
        second_name: "kilograms",
        forward: pounds_to_kilograms,
        backward: kilograms_to_pounds,
        decimals: 2,
    },
];

fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

fn feet_to_meters(ft: f64) -> f64 {
    ft * 0.3048
}

fn meters_to_feet(m: f64) -> f64 {
    m / 0.3048
}

fn miles_to_kilometers(mi: f64) -> f64 {
    mi * 1.609_34
}

fn kilometers_to_miles(km: f64) -> f64 {
    km / 1.609_34
}

fn pounds_to_kilograms(lb: f64) -> f64 {
    lb * 0.453_592
}

fn kilograms_to_pounds(kg: f64) -> f64 {
    kg / 0.453_592
}

const CONVERSION_KEYWORDS: &[&str] = &[
    "convert",
    "fahrenheit",
    "celsius",
    "feet",
    "meter",
    "mile",
    "kilometer",
    "pound",
    "kilogram",
];

/// Temperature, length and weight conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionHandler;

impl ConversionHandler {
    fn convert(text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let value: f64 = NUMBER_RE.find(text)?.as_str().parse().ok()?;

        UNIT_PAIRS.iter().find_map(|pair| {
            let first_pos = lower.find(pair.first)?;
            let second_pos = lower.find(pair.second)?;
            let digits = pair.decimals;

            let sentence = if first_pos < second_pos {
                let result = (pair.forward)(value);
                format!(
                    "{} {} is {result:.digits$} {}",
                    format_number(value),
                    pair.first_name,
                    pair.second_name
                )
            } else {
                let result = (pair.backward)(value);
                format!(
                    "{} {} is {result:.digits$} {}",
                    format_number(value),
                    pair.second_name,
                    pair.first_name
                )
            };
            Some(sentence)
        })
    }
}

impl CommandHandler for ConversionHandler {
    fn can_handle(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        CONVERSION_KEYWORDS.iter().any(|k| lower.contains(k))
    }

    fn handle(&self, text: &str) -> CommandResult {
        Self::convert(text).map_or_else(
            || {
                CommandResult::failed(self.command_type(), CONVERSION_FAILURE)
                    .with_metadata(serde_json::json!({ "original_query": text }))
            },
            |answer| {
                CommandResult::ok(self.command_type(), answer)
                    .with_metadata(serde_json::json!({ "original_query": text }))
            },
        )
    }

    fn command_type(&self) -> &'static str {
        "conversion"
    }
}

/// Format a number for speech: integers without a fraction, otherwise up to
/// two decimals
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
