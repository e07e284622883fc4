//! Externally observable quantities derived from the telegrams.

use crate::protocol::Variable;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Property {
    FanSpeed,
    FanSpeedMax,
    FanSpeedMin,
    TempInside,
    TempOutside,
    TempExhaust,
    TempIncoming,
    InEfficiency,
    OutEfficiency,
    AverageEfficiency,
    // select status bits
    SelectStatus,
    PowerState,
    Co2AdjustState,
    HumidityAdjustState,
    HeatingState,
    FilterGuardIndicator,
    HeatingIndicator,
    FaultIndicator,
    ServiceReminderIndicator,
    Humidity,
    BasicHumidityLevel,
    HumiditySensor1,
    HumiditySensor2,
    Co2High,
    Co2Low,
    Co2,
    Co2SetPointHigh,
    Co2SetPointLow,
    Co2SetPoint,
    DcFanInputAdjustment,
    DcFanOutputAdjustment,
    InputFanStopThreshold,
    HeatingSetPoint,
    PreHeatingSetPoint,
    HrcBypassThreshold,
    CellDefrostingThreshold,
    // program bits
    Program,
    AdjustmentIntervalMinutes,
    AutomaticHumidityLevelSeekerState,
    BoostSwitchMode,
    RadiatorType,
    CascadeAdjust,
    Program2,
    MaxSpeedLimitMode,
    ServiceReminder,
    PostHeatingOn,
    // I/O port 2 bits
    IoPortMultiPurpose2,
    DamperMotorPosition,
    FaultSignalRelayClosed,
    SupplyFanOff,
    PreHeatingOn,
    ExhaustFanOff,
    FirePlaceBoosterClosed,
    IncomingCurrent,
    LastErrorNumber,
}

impl Property {
    pub const ALL: [Property; 55] = [
        Property::FanSpeed,
        Property::FanSpeedMax,
        Property::FanSpeedMin,
        Property::TempInside,
        Property::TempOutside,
        Property::TempExhaust,
        Property::TempIncoming,
        Property::InEfficiency,
        Property::OutEfficiency,
        Property::AverageEfficiency,
        Property::SelectStatus,
        Property::PowerState,
        Property::Co2AdjustState,
        Property::HumidityAdjustState,
        Property::HeatingState,
        Property::FilterGuardIndicator,
        Property::HeatingIndicator,
        Property::FaultIndicator,
        Property::ServiceReminderIndicator,
        Property::Humidity,
        Property::BasicHumidityLevel,
        Property::HumiditySensor1,
        Property::HumiditySensor2,
        Property::Co2High,
        Property::Co2Low,
        Property::Co2,
        Property::Co2SetPointHigh,
        Property::Co2SetPointLow,
        Property::Co2SetPoint,
        Property::DcFanInputAdjustment,
        Property::DcFanOutputAdjustment,
        Property::InputFanStopThreshold,
        Property::HeatingSetPoint,
        Property::PreHeatingSetPoint,
        Property::HrcBypassThreshold,
        Property::CellDefrostingThreshold,
        Property::Program,
        Property::AdjustmentIntervalMinutes,
        Property::AutomaticHumidityLevelSeekerState,
        Property::BoostSwitchMode,
        Property::RadiatorType,
        Property::CascadeAdjust,
        Property::Program2,
        Property::MaxSpeedLimitMode,
        Property::ServiceReminder,
        Property::PostHeatingOn,
        Property::IoPortMultiPurpose2,
        Property::DamperMotorPosition,
        Property::FaultSignalRelayClosed,
        Property::SupplyFanOff,
        Property::PreHeatingOn,
        Property::ExhaustFanOff,
        Property::FirePlaceBoosterClosed,
        Property::IncomingCurrent,
        Property::LastErrorNumber,
    ];

    /// The variable to poll for an update of this property.
    ///
    /// Several properties share one variable when it packs multiple bit fields.
    /// Calculated properties cannot be polled and return `None`.
    pub fn variable(self) -> Option<Variable> {
        let variable = match self {
            Property::InEfficiency | Property::OutEfficiency | Property::AverageEfficiency => {
                return None
            }
            Property::Program
            | Property::AdjustmentIntervalMinutes
            | Property::AutomaticHumidityLevelSeekerState
            | Property::BoostSwitchMode
            | Property::RadiatorType
            | Property::CascadeAdjust => Variable::Program,
            Property::Program2 | Property::MaxSpeedLimitMode => Variable::Program2,
            Property::SelectStatus
            | Property::PowerState
            | Property::Co2AdjustState
            | Property::HumidityAdjustState
            | Property::HeatingState
            | Property::FilterGuardIndicator
            | Property::HeatingIndicator
            | Property::FaultIndicator
            | Property::ServiceReminderIndicator => Variable::Select,
            Property::PostHeatingOn => Variable::IoPortMultiPurpose1,
            Property::IoPortMultiPurpose2
            | Property::DamperMotorPosition
            | Property::FaultSignalRelayClosed
            | Property::SupplyFanOff
            | Property::PreHeatingOn
            | Property::ExhaustFanOff
            | Property::FirePlaceBoosterClosed => Variable::IoPortMultiPurpose2,
            Property::FanSpeed => Variable::FanSpeed,
            Property::FanSpeedMax => Variable::FanSpeedMax,
            Property::FanSpeedMin => Variable::FanSpeedMin,
            Property::TempInside => Variable::TempInside,
            Property::TempOutside => Variable::TempOutside,
            Property::TempExhaust => Variable::TempExhaust,
            Property::TempIncoming => Variable::TempIncoming,
            Property::Humidity => Variable::Humidity,
            Property::BasicHumidityLevel => Variable::BasicHumidityLevel,
            Property::HumiditySensor1 => Variable::HumiditySensor1,
            Property::HumiditySensor2 => Variable::HumiditySensor2,
            // the composite is answered by polling its high byte first
            Property::Co2High | Property::Co2 => Variable::Co2High,
            Property::Co2Low => Variable::Co2Low,
            Property::Co2SetPointHigh | Property::Co2SetPoint => Variable::Co2SetPointUpper,
            Property::Co2SetPointLow => Variable::Co2SetPointLower,
            Property::DcFanInputAdjustment => Variable::DcFanInputAdjustment,
            Property::DcFanOutputAdjustment => Variable::DcFanOutputAdjustment,
            Property::InputFanStopThreshold => Variable::InputFanStop,
            Property::HeatingSetPoint => Variable::HeatingSetPoint,
            Property::PreHeatingSetPoint => Variable::PreHeatingSetPoint,
            Property::HrcBypassThreshold => Variable::HrcBypass,
            Property::CellDefrostingThreshold => Variable::CellDefrosting,
            Property::ServiceReminder => Variable::ServiceReminder,
            Property::IncomingCurrent => Variable::CurrentIncoming,
            Property::LastErrorNumber => Variable::LastErrorNumber,
        };
        Some(variable)
    }

    /// Kebab case name, used for topics and on the commandline.
    pub fn name(self) -> String {
        let debug = format!("{self:?}");
        let mut name = String::with_capacity(debug.len() + 8);
        for (i, c) in debug.chars().enumerate() {
            if c.is_ascii_uppercase() {
                if i > 0 {
                    name.push('-');
                }
                name.push(c.to_ascii_lowercase());
            } else {
                name.push(c);
            }
        }
        name
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl std::str::FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown property '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PropertyValue {
    Bool(bool),
    Integer(i32),
    Decimal(f32),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Decimal(v) => write!(f, "{v:.1}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculated_properties_cannot_be_polled() {
        assert_eq!(Property::InEfficiency.variable(), None);
        assert_eq!(Property::OutEfficiency.variable(), None);
        assert_eq!(Property::AverageEfficiency.variable(), None);
    }

    #[test]
    fn select_bits_share_one_variable() {
        let select = [
            Property::SelectStatus,
            Property::PowerState,
            Property::Co2AdjustState,
            Property::HumidityAdjustState,
            Property::HeatingState,
            Property::FilterGuardIndicator,
            Property::HeatingIndicator,
            Property::FaultIndicator,
            Property::ServiceReminderIndicator,
        ];
        for property in select {
            assert_eq!(property.variable(), Some(Variable::Select));
        }
        assert_eq!(Property::TempOutside.variable(), Some(Variable::TempOutside));
        assert_eq!(Property::Co2.variable(), Some(Variable::Co2High));
    }

    #[test]
    fn all_is_complete_and_unique() {
        let mut names: Vec<String> = Property::ALL.iter().map(|p| p.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Property::ALL.len());
        let pollable = Property::ALL.iter().filter(|p| p.variable().is_some()).count();
        assert_eq!(pollable, Property::ALL.len() - 3);
    }

    #[test]
    fn names() {
        assert_eq!(Property::FanSpeed.name(), "fan-speed");
        assert_eq!(Property::Co2SetPointHigh.name(), "co2-set-point-high");
        assert_eq!(Property::HumiditySensor1.to_string(), "humidity-sensor1");
        assert_eq!("temp-inside".parse::<Property>(), Ok(Property::TempInside));
        assert_eq!("TEMP-INSIDE".parse::<Property>(), Ok(Property::TempInside));
        assert!("temperature".parse::<Property>().is_err());
    }

    #[test]
    fn value_display() {
        assert_eq!(PropertyValue::Bool(true).to_string(), "true");
        assert_eq!(PropertyValue::Integer(-12).to_string(), "-12");
        assert_eq!(PropertyValue::Decimal(41.666).to_string(), "41.7");
    }
}
