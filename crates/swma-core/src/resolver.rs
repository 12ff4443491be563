//! Numeric change resolution
//!
//! Pure functions from `(original, directive)` to a new value. Each attribute
//! class has its own formula; callers pass the pristine value.

use crate::directive::Directive;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Lowest accepted percentage
pub const PERCENT_MIN: f64 = -100.0;
/// Highest accepted percentage
pub const PERCENT_MAX: f64 = 1000.0;
/// Engine-level minimum interval between pulses of a burst, in seconds
pub const MIN_PULSE_DELAY: f64 = 0.05;

/// Tolerance for binary rounding before flooring (`100 * 1.15` is `114.999...`)
const FLOOR_EPSILON: f64 = 1e-9;

/// Template attributes stored as whole numbers
pub const INTEGER_ATTRIBUTES: &[&str] = &[
    "shield_points",
    "shield_refresh_rate",
    "population_value",
    "build_cost_credits",
    "tactical_build_cost_multiplayer",
    "tactical_build_time_seconds",
];

/// Formula family an attribute belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeClass {
    /// Plain real value (hull, energy, speed, ...)
    Scalar,
    /// Whole-number value; results are floored
    Integer,
    /// Recharge time between shots, scaled by fire-rate increase
    RechargeTime,
    /// Shots per burst, scaled by damage increase
    PulseCount,
    /// Delay between shots of a burst
    PulseDelay,
}

impl AttributeClass {
    /// Class of a template or cost attribute by name
    pub fn for_attribute(name: &str) -> Self {
        if INTEGER_ATTRIBUTES
            .iter()
            .any(|a| a.eq_ignore_ascii_case(name))
        {
            AttributeClass::Integer
        } else {
            AttributeClass::Scalar
        }
    }
}

/// Hardpoint directive names as they appear in a unit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardpointAdjustment {
    FireRateIncrease,
    DamageIncrease,
    BurstDelayAdjustment,
}

impl HardpointAdjustment {
    /// Hardpoint tags the adjustment rewrites
    pub fn target_tags(&self) -> &'static [&'static str] {
        match self {
            HardpointAdjustment::FireRateIncrease => {
                &["Fire_Min_Recharge_Seconds", "Fire_Max_Recharge_Seconds"]
            }
            HardpointAdjustment::DamageIncrease => &["Fire_Pulse_Count"],
            HardpointAdjustment::BurstDelayAdjustment => &["Fire_Pulse_Delay_Seconds"],
        }
    }

    pub fn class(&self) -> AttributeClass {
        match self {
            HardpointAdjustment::FireRateIncrease => AttributeClass::RechargeTime,
            HardpointAdjustment::DamageIncrease => AttributeClass::PulseCount,
            HardpointAdjustment::BurstDelayAdjustment => AttributeClass::PulseDelay,
        }
    }
}

/// Compute the new value of an attribute
pub fn resolve(class: AttributeClass, original: f64, directive: Directive) -> Result<f64> {
    if !original.is_finite() {
        return Err(Error::invalid_directive(
            directive,
            format!("original value {original} is not finite"),
        ));
    }
    validate(directive)?;

    match (class, directive) {
        (AttributeClass::Scalar, Directive::Percent(p)) => Ok(original * factor(p)),
        (AttributeClass::Scalar, Directive::Absolute(v)) => Ok(v),
        (AttributeClass::Integer, Directive::Percent(p)) => Ok(floor(original * factor(p))),
        (AttributeClass::Integer, Directive::Absolute(v)) => Ok(floor(v)),
        (AttributeClass::RechargeTime, Directive::Percent(p)) => {
            if p <= PERCENT_MIN {
                return Err(Error::invalid_directive(
                    directive,
                    "fire rate increase must be greater than -100%",
                ));
            }
            Ok(original / factor(p))
        }
        (AttributeClass::PulseCount, Directive::Percent(p)) => {
            Ok((original + 1.0).max(floor(original * factor(p))))
        }
        (AttributeClass::PulseDelay, Directive::Percent(p)) => {
            Ok(MIN_PULSE_DELAY.max(original * factor(p)))
        }
        (
            AttributeClass::RechargeTime | AttributeClass::PulseCount | AttributeClass::PulseDelay,
            Directive::Absolute(_),
        ) => Err(Error::invalid_directive(
            directive,
            "hardpoint adjustments must be percentages",
        )),
    }
}

fn factor(percent: f64) -> f64 {
    1.0 + percent / 100.0
}

fn floor(value: f64) -> f64 {
    (value + FLOOR_EPSILON).floor()
}

fn validate(directive: Directive) -> Result<()> {
    match directive {
        Directive::Percent(p) if !p.is_finite() || !(PERCENT_MIN..=PERCENT_MAX).contains(&p) => {
            Err(Error::invalid_directive(
                directive,
                format!("percentage must be within {PERCENT_MIN}%..={PERCENT_MAX}%"),
            ))
        }
        Directive::Absolute(v) if !v.is_finite() => {
            Err(Error::invalid_directive(directive, "value is not finite"))
        }
        _ => Ok(()),
    }
}

/// Parse attribute text as a number
pub fn parse_number(raw: &str, entity: &str, attribute: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidAttributeValue {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
            value: raw.to_string(),
        })
}

/// Render a resolved value as attribute text
///
/// Whole-number classes print without a fraction; real values keep at most
/// four decimals and at least one.
pub fn format_value(class: AttributeClass, value: f64) -> String {
    match class {
        AttributeClass::Integer | AttributeClass::PulseCount => format!("{}", value as i64),
        _ => format_real(value),
    }
}

/// Render a resolved value in the style of the text it replaces
///
/// A whole result replacing integral text (`3000`) stays integral.
pub fn format_like(class: AttributeClass, value: f64, original_raw: &str) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 && is_integral_text(original_raw) {
        format!("{}", value as i64)
    } else {
        format_value(class, value)
    }
}

fn is_integral_text(raw: &str) -> bool {
    let raw = raw.trim();
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn format_real(value: f64) -> String {
    let fixed = format!("{value:.4}");
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}
