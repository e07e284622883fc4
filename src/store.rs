//! Latest known state of the ventilation unit.
//!
//! [`ValloxStore::update`] projects one received [`Telegram`] onto the store
//! and reports the properties to notify, in order.

use crate::conversion::{
    convert_fan_speed, convert_humidity, convert_temperature, merge_hex_pair,
};
use crate::property::{Property, PropertyValue};
use crate::protocol::{Telegram, Variable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! read_bit {
    ($byte:expr,$position:expr) => {
        ($byte >> $position) & 1 != 0
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValloxStore {
    /// `None` until a known fan speed mask is received.
    pub fan_speed: Option<u8>,
    pub fan_speed_max: Option<u8>,
    pub fan_speed_min: Option<u8>,

    pub temp_inside: i8,
    pub temp_outside: i8,
    pub temp_exhaust: i8,
    pub temp_incoming: i8,

    pub in_efficiency: i32,
    pub out_efficiency: i32,
    pub average_efficiency: i32,

    pub power_state: bool,
    pub co2_adjust_state: bool,
    pub humidity_adjust_state: bool,
    pub heating_state: bool,
    pub filter_guard_indicator: bool,
    pub heating_indicator: bool,
    pub fault_indicator: bool,
    pub service_reminder_indicator: bool,

    pub humidity: f32,
    pub basic_humidity_level: f32,
    pub humidity_sensor1: f32,
    pub humidity_sensor2: f32,

    /// Halves of the composites, `None` until received.
    pub co2_high: Option<u8>,
    pub co2_low: Option<u8>,
    pub co2: u16,
    pub co2_set_point_high: Option<u8>,
    pub co2_set_point_low: Option<u8>,
    pub co2_set_point: u16,

    /// Percent
    pub dc_fan_input_adjustment: u8,
    /// Percent
    pub dc_fan_output_adjustment: u8,

    pub input_fan_stop_threshold: i8,
    pub heating_set_point: i8,
    pub pre_heating_set_point: i8,
    pub hrc_bypass_threshold: i8,
    pub cell_defrosting_threshold: i8,

    pub adjustment_interval_minutes: u8,
    pub automatic_humidity_level_seeker_state: bool,
    /// `true` = boost, `false` = fireplace
    pub boost_switch_mode: bool,
    /// `true` = water, `false` = electric
    pub radiator_type: bool,
    pub cascade_adjust: bool,

    pub max_speed_limit_mode: bool,

    /// Months
    pub service_reminder: u8,

    pub post_heating_on: bool,

    pub damper_motor_position: bool,
    pub fault_signal_relay_closed: bool,
    pub supply_fan_off: bool,
    pub pre_heating_on: bool,
    pub exhaust_fan_off: bool,
    pub fire_place_booster_closed: bool,

    pub incoming_current: u8,
    pub last_error_number: u8,

    /// Set while a CO2 sensor exchange reserves the bus.
    pub suspended: bool,
}

impl ValloxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `telegram` and returns the properties whose listeners have to
    /// be notified.
    pub fn update(&mut self, telegram: &Telegram) -> Vec<Property> {
        let mut changed = Vec::new();
        let value = telegram.argument;

        match telegram.variable() {
            Variable::IoPortMultiPurpose1 => {
                // bit 5: post-heating on
                self.post_heating_on = read_bit!(value, 5);
                changed.push(Property::PostHeatingOn);
            }
            Variable::IoPortMultiPurpose2 => self.update_io_port_multi_purpose2(value, &mut changed),
            Variable::CurrentIncoming => {
                self.incoming_current = value;
                changed.push(Property::IncomingCurrent);
            }
            Variable::LastErrorNumber => {
                self.last_error_number = value;
                changed.push(Property::LastErrorNumber);
            }
            Variable::FanSpeed => {
                self.fan_speed = convert_fan_speed(value);
                changed.push(Property::FanSpeed);
            }
            Variable::TempOutside => {
                self.temp_outside = convert_temperature(value);
                changed.push(Property::TempOutside);
                self.update_efficiencies(&mut changed);
            }
            Variable::TempExhaust => {
                self.temp_exhaust = convert_temperature(value);
                changed.push(Property::TempExhaust);
                self.update_efficiencies(&mut changed);
            }
            Variable::TempInside => {
                self.temp_inside = convert_temperature(value);
                changed.push(Property::TempInside);
                self.update_efficiencies(&mut changed);
            }
            Variable::TempIncoming => {
                self.temp_incoming = convert_temperature(value);
                changed.push(Property::TempIncoming);
                self.update_efficiencies(&mut changed);
            }
            Variable::Select => self.update_select(value, &mut changed),
            Variable::Humidity => {
                self.humidity = convert_humidity(value);
                changed.push(Property::Humidity);
            }
            Variable::BasicHumidityLevel => {
                self.basic_humidity_level = convert_humidity(value);
                changed.push(Property::BasicHumidityLevel);
            }
            Variable::HumiditySensor1 => {
                self.humidity_sensor1 = convert_humidity(value);
                changed.push(Property::HumiditySensor1);
            }
            Variable::HumiditySensor2 => {
                self.humidity_sensor2 = convert_humidity(value);
                changed.push(Property::HumiditySensor2);
            }
            Variable::Co2High => {
                self.co2_high = Some(value);
                changed.push(Property::Co2High);
                self.update_co2(&mut changed);
            }
            Variable::Co2Low => {
                self.co2_low = Some(value);
                changed.push(Property::Co2Low);
                self.update_co2(&mut changed);
            }
            Variable::Co2SetPointUpper => {
                self.co2_set_point_high = Some(value);
                changed.push(Property::Co2SetPointHigh);
                self.update_co2_set_point(&mut changed);
            }
            Variable::Co2SetPointLower => {
                self.co2_set_point_low = Some(value);
                changed.push(Property::Co2SetPointLow);
                self.update_co2_set_point(&mut changed);
            }
            Variable::FanSpeedMax => {
                self.fan_speed_max = convert_fan_speed(value);
                changed.push(Property::FanSpeedMax);
            }
            Variable::FanSpeedMin => {
                self.fan_speed_min = convert_fan_speed(value);
                changed.push(Property::FanSpeedMin);
            }
            Variable::DcFanInputAdjustment => {
                self.dc_fan_input_adjustment = value;
                changed.push(Property::DcFanInputAdjustment);
            }
            Variable::DcFanOutputAdjustment => {
                self.dc_fan_output_adjustment = value;
                changed.push(Property::DcFanOutputAdjustment);
            }
            Variable::InputFanStop => {
                self.input_fan_stop_threshold = convert_temperature(value);
                changed.push(Property::InputFanStopThreshold);
            }
            Variable::HeatingSetPoint => {
                self.heating_set_point = convert_temperature(value);
                changed.push(Property::HeatingSetPoint);
            }
            Variable::PreHeatingSetPoint => {
                self.pre_heating_set_point = convert_temperature(value);
                changed.push(Property::PreHeatingSetPoint);
            }
            Variable::HrcBypass => {
                self.hrc_bypass_threshold = convert_temperature(value);
                changed.push(Property::HrcBypassThreshold);
            }
            Variable::CellDefrosting => {
                self.cell_defrosting_threshold = convert_temperature(value);
                changed.push(Property::CellDefrostingThreshold);
            }
            Variable::Program => self.update_program(value, &mut changed),
            Variable::Program2 => {
                // bit 0: max speed limit 0 = with adjustment, 1 = always
                self.max_speed_limit_mode = read_bit!(value, 0);
                changed.push(Property::MaxSpeedLimitMode);
            }
            Variable::ServiceReminder => {
                self.service_reminder = value;
                changed.push(Property::ServiceReminder);
            }
            Variable::Suspend => {
                log::trace!("bus suspended");
                self.suspended = true;
            }
            Variable::Resume => {
                log::trace!("bus resumed");
                self.suspended = false;
            }
            // Bit patterns of these are not known yet.
            Variable::IoPortFanSpeedRelays
            | Variable::InstalledCo2Sensors
            | Variable::PostHeatingOnCounter
            | Variable::PostHeatingOffTime
            | Variable::PostHeatingTargetValue
            | Variable::Flags1
            | Variable::Flags2
            | Variable::Flags3
            | Variable::Flags4
            | Variable::Flags5
            | Variable::Flags6
            | Variable::FirePlaceBoosterCounter
            | Variable::MaintenanceMonthCounter
            | Variable::Poll => {}
            Variable::Unknown(_) => log::debug!("Unknown command received: {telegram}"),
        }
        changed
    }

    fn update_io_port_multi_purpose2(&mut self, value: u8, changed: &mut Vec<Property>) {
        // bit 1: damper motor position - 0=winter 1=season
        // bit 2: fault signal relay - 0=open 1=closed
        // bit 3: supply fan - 0=on 1=off
        // bit 4: pre-heating - 0=off 1=on
        // bit 5: exhaust fan - 0=on 1=off
        // bit 6: fireplace booster - 0=open 1=closed
        self.damper_motor_position = read_bit!(value, 1);
        self.fault_signal_relay_closed = read_bit!(value, 2);
        self.supply_fan_off = read_bit!(value, 3);
        self.pre_heating_on = read_bit!(value, 4);
        self.exhaust_fan_off = read_bit!(value, 5);
        self.fire_place_booster_closed = read_bit!(value, 6);
        changed.extend([
            Property::DamperMotorPosition,
            Property::FaultSignalRelayClosed,
            Property::SupplyFanOff,
            Property::PreHeatingOn,
            Property::ExhaustFanOff,
            Property::FirePlaceBoosterClosed,
        ]);
    }

    fn update_select(&mut self, value: u8, changed: &mut Vec<Property>) {
        self.power_state = read_bit!(value, 0);
        self.co2_adjust_state = read_bit!(value, 1);
        self.humidity_adjust_state = read_bit!(value, 2);
        self.heating_state = read_bit!(value, 3);
        self.filter_guard_indicator = read_bit!(value, 4);
        self.heating_indicator = read_bit!(value, 5);
        self.fault_indicator = read_bit!(value, 6);
        self.service_reminder_indicator = read_bit!(value, 7);
        changed.extend([
            Property::PowerState,
            Property::Co2AdjustState,
            Property::HumidityAdjustState,
            Property::HeatingState,
            Property::FilterGuardIndicator,
            Property::HeatingIndicator,
            Property::FaultIndicator,
            Property::ServiceReminderIndicator,
        ]);
    }

    fn update_program(&mut self, value: u8, changed: &mut Vec<Property>) {
        // bits 0-3: adjustment interval of CO2 and %RH in minutes
        self.adjustment_interval_minutes = value & 0x0F;
        self.automatic_humidity_level_seeker_state = read_bit!(value, 4);
        self.boost_switch_mode = read_bit!(value, 5);
        self.radiator_type = read_bit!(value, 6);
        self.cascade_adjust = read_bit!(value, 7);
        changed.extend([
            Property::AdjustmentIntervalMinutes,
            Property::AutomaticHumidityLevelSeekerState,
            Property::BoostSwitchMode,
            Property::RadiatorType,
            Property::CascadeAdjust,
        ]);
    }

    fn update_co2(&mut self, changed: &mut Vec<Property>) {
        let (Some(high), Some(low)) = (self.co2_high, self.co2_low) else {
            return;
        };
        match merge_hex_pair(high, low) {
            Ok(co2) => {
                self.co2 = co2;
                changed.push(Property::Co2);
            }
            Err(err) => log::debug!("error merging co2: {err}"),
        }
    }

    fn update_co2_set_point(&mut self, changed: &mut Vec<Property>) {
        let (Some(high), Some(low)) = (self.co2_set_point_high, self.co2_set_point_low) else {
            return;
        };
        match merge_hex_pair(high, low) {
            Ok(set_point) => {
                log::trace!("merged co2 set point high={high:02X} low={low:02X} -> {set_point}");
                self.co2_set_point = set_point;
                changed.push(Property::Co2SetPoint);
            }
            Err(err) => log::debug!("error merging co2 set point: {err}"),
        }
    }

    /// Recomputes the heat recovery efficiencies, notifying only changed values.
    fn update_efficiencies(&mut self, changed: &mut Vec<Property>) {
        let max_possible = i32::from(self.temp_inside) - i32::from(self.temp_outside);
        let (in_efficiency, out_efficiency) = if max_possible <= 0 {
            (100, 100)
        } else {
            let incoming = i32::from(self.temp_incoming) - i32::from(self.temp_outside);
            let exhaust = i32::from(self.temp_inside) - i32::from(self.temp_exhaust);
            (
                (f64::from(incoming) * 100.0 / f64::from(max_possible)) as i32,
                (f64::from(exhaust) * 100.0 / f64::from(max_possible)) as i32,
            )
        };
        let average_efficiency = if max_possible <= 0 {
            100
        } else {
            (in_efficiency + out_efficiency) / 2
        };

        if self.in_efficiency != in_efficiency {
            self.in_efficiency = in_efficiency;
            changed.push(Property::InEfficiency);
        }
        if self.out_efficiency != out_efficiency {
            self.out_efficiency = out_efficiency;
            changed.push(Property::OutEfficiency);
        }
        if self.average_efficiency != average_efficiency {
            self.average_efficiency = average_efficiency;
            changed.push(Property::AverageEfficiency);
        }
    }

    /// Current value of `property`.
    ///
    /// `None` for the poll-only properties that group several bit fields and
    /// for fan speeds that have not been received as a known mask. CO2 halves
    /// are `None` until received.
    pub fn value(&self, property: Property) -> Option<PropertyValue> {
        use PropertyValue::{Bool, Decimal, Integer};

        let value = match property {
            Property::SelectStatus
            | Property::Program
            | Property::Program2
            | Property::IoPortMultiPurpose2 => return None,
            Property::FanSpeed => Integer(self.fan_speed?.into()),
            Property::FanSpeedMax => Integer(self.fan_speed_max?.into()),
            Property::FanSpeedMin => Integer(self.fan_speed_min?.into()),
            Property::TempInside => Integer(self.temp_inside.into()),
            Property::TempOutside => Integer(self.temp_outside.into()),
            Property::TempExhaust => Integer(self.temp_exhaust.into()),
            Property::TempIncoming => Integer(self.temp_incoming.into()),
            Property::InEfficiency => Integer(self.in_efficiency),
            Property::OutEfficiency => Integer(self.out_efficiency),
            Property::AverageEfficiency => Integer(self.average_efficiency),
            Property::PowerState => Bool(self.power_state),
            Property::Co2AdjustState => Bool(self.co2_adjust_state),
            Property::HumidityAdjustState => Bool(self.humidity_adjust_state),
            Property::HeatingState => Bool(self.heating_state),
            Property::FilterGuardIndicator => Bool(self.filter_guard_indicator),
            Property::HeatingIndicator => Bool(self.heating_indicator),
            Property::FaultIndicator => Bool(self.fault_indicator),
            Property::ServiceReminderIndicator => Bool(self.service_reminder_indicator),
            Property::Humidity => Decimal(self.humidity),
            Property::BasicHumidityLevel => Decimal(self.basic_humidity_level),
            Property::HumiditySensor1 => Decimal(self.humidity_sensor1),
            Property::HumiditySensor2 => Decimal(self.humidity_sensor2),
            Property::Co2High => Integer(self.co2_high?.into()),
            Property::Co2Low => Integer(self.co2_low?.into()),
            Property::Co2 => Integer(self.co2.into()),
            Property::Co2SetPointHigh => Integer(self.co2_set_point_high?.into()),
            Property::Co2SetPointLow => Integer(self.co2_set_point_low?.into()),
            Property::Co2SetPoint => Integer(self.co2_set_point.into()),
            Property::DcFanInputAdjustment => Integer(self.dc_fan_input_adjustment.into()),
            Property::DcFanOutputAdjustment => Integer(self.dc_fan_output_adjustment.into()),
            Property::InputFanStopThreshold => Integer(self.input_fan_stop_threshold.into()),
            Property::HeatingSetPoint => Integer(self.heating_set_point.into()),
            Property::PreHeatingSetPoint => Integer(self.pre_heating_set_point.into()),
            Property::HrcBypassThreshold => Integer(self.hrc_bypass_threshold.into()),
            Property::CellDefrostingThreshold => Integer(self.cell_defrosting_threshold.into()),
            Property::AdjustmentIntervalMinutes => {
                Integer(self.adjustment_interval_minutes.into())
            }
            Property::AutomaticHumidityLevelSeekerState => {
                Bool(self.automatic_humidity_level_seeker_state)
            }
            Property::BoostSwitchMode => Bool(self.boost_switch_mode),
            Property::RadiatorType => Bool(self.radiator_type),
            Property::CascadeAdjust => Bool(self.cascade_adjust),
            Property::MaxSpeedLimitMode => Bool(self.max_speed_limit_mode),
            Property::ServiceReminder => Integer(self.service_reminder.into()),
            Property::PostHeatingOn => Bool(self.post_heating_on),
            Property::DamperMotorPosition => Bool(self.damper_motor_position),
            Property::FaultSignalRelayClosed => Bool(self.fault_signal_relay_closed),
            Property::SupplyFanOff => Bool(self.supply_fan_off),
            Property::PreHeatingOn => Bool(self.pre_heating_on),
            Property::ExhaustFanOff => Bool(self.exhaust_fan_off),
            Property::FirePlaceBoosterClosed => Bool(self.fire_place_booster_closed),
            Property::IncomingCurrent => Integer(self.incoming_current.into()),
            Property::LastErrorNumber => Integer(self.last_error_number.into()),
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::convert_back_temperature;
    use crate::protocol::address;

    fn telegram(variable: Variable, argument: u8) -> Telegram {
        Telegram::new(address::MASTER, address::PANEL1, variable.code(), argument)
    }

    fn temperature(store: &mut ValloxStore, variable: Variable, celsius: i8) -> Vec<Property> {
        let argument = convert_back_temperature(celsius);
        assert_eq!(convert_temperature(argument), celsius);
        store.update(&telegram(variable, argument))
    }

    #[test]
    fn new_store_is_zeroed() {
        let store = ValloxStore::new();
        assert_eq!(store.fan_speed, None);
        assert_eq!(store.temp_inside, 0);
        assert_eq!(store.co2, 0);
        assert!(!store.suspended);
        assert!(!store.power_state);
    }

    #[test]
    fn fan_speed() {
        let mut store = ValloxStore::new();
        assert_eq!(
            store.update(&telegram(Variable::FanSpeed, 0x0F)),
            vec![Property::FanSpeed]
        );
        assert_eq!(store.fan_speed, Some(4));
        assert_eq!(store.value(Property::FanSpeed), Some(PropertyValue::Integer(4)));

        store.update(&telegram(Variable::FanSpeed, 0x05));
        assert_eq!(store.fan_speed, None);
        assert_eq!(store.value(Property::FanSpeed), None);
    }

    #[test]
    fn temperature_notifies_always() {
        let mut store = ValloxStore::new();
        let first = store.update(&telegram(Variable::TempOutside, 0x64));
        assert_eq!(first[0], Property::TempOutside);
        let second = store.update(&telegram(Variable::TempOutside, 0x64));
        assert_eq!(second, vec![Property::TempOutside]);
    }

    #[test]
    fn efficiency_clamped_without_temperature_difference() {
        let mut store = ValloxStore::new();
        temperature(&mut store, Variable::TempInside, 20);
        temperature(&mut store, Variable::TempOutside, 20);
        assert_eq!(store.in_efficiency, 100);
        assert_eq!(store.out_efficiency, 100);
        assert_eq!(store.average_efficiency, 100);
    }

    #[test]
    fn efficiency_computation() {
        let mut store = ValloxStore::new();
        temperature(&mut store, Variable::TempOutside, 0);
        temperature(&mut store, Variable::TempIncoming, 50);
        temperature(&mut store, Variable::TempExhaust, 30);
        let changed = temperature(&mut store, Variable::TempInside, 100);
        assert_eq!(store.in_efficiency, 50);
        assert_eq!(store.out_efficiency, 70);
        assert_eq!(store.average_efficiency, 60);
        assert_eq!(
            changed,
            vec![
                Property::TempInside,
                Property::InEfficiency,
                Property::OutEfficiency,
                Property::AverageEfficiency
            ]
        );

        // identical temperatures again: only the temperatures are notified
        for (variable, celsius) in [
            (Variable::TempOutside, 0),
            (Variable::TempIncoming, 50),
            (Variable::TempExhaust, 30),
            (Variable::TempInside, 100),
        ] {
            let changed = temperature(&mut store, variable, celsius);
            assert_eq!(changed.len(), 1);
        }
    }

    #[test]
    fn efficiency_truncates() {
        let mut store = ValloxStore::new();
        temperature(&mut store, Variable::TempOutside, -10);
        temperature(&mut store, Variable::TempIncoming, 10);
        temperature(&mut store, Variable::TempExhaust, 0);
        temperature(&mut store, Variable::TempInside, 20);
        // 20 * 100 / 30 = 66.6, 20 * 100 / 30 = 66.6
        assert_eq!(store.in_efficiency, 66);
        assert_eq!(store.out_efficiency, 66);
        assert_eq!(store.average_efficiency, 66);
    }

    #[test]
    fn co2_merge() {
        let mut store = ValloxStore::new();
        assert_eq!(
            store.update(&telegram(Variable::Co2High, 0x32)),
            vec![Property::Co2High]
        );
        assert_eq!(store.co2, 0);
        assert_eq!(store.value(Property::Co2Low), None);
        assert_eq!(
            store.update(&telegram(Variable::Co2Low, 0x07)),
            vec![Property::Co2Low, Property::Co2]
        );
        assert_eq!(store.co2, 0x3207);
        assert_eq!(store.value(Property::Co2), Some(PropertyValue::Integer(12807)));
    }

    #[test]
    fn co2_set_point_merge() {
        let mut store = ValloxStore::new();
        assert_eq!(
            store.update(&telegram(Variable::Co2SetPointUpper, 0x03)),
            vec![Property::Co2SetPointHigh]
        );
        assert_eq!(store.co2_set_point, 0);
        let changed = store.update(&telegram(Variable::Co2SetPointLower, 0x84));
        assert_eq!(changed, vec![Property::Co2SetPointLow, Property::Co2SetPoint]);
        assert_eq!(store.co2_set_point, 0x0384);
        assert_eq!(store.co2, 0);
    }

    #[test]
    fn suspend_and_resume() {
        let mut store = ValloxStore::new();
        assert!(store.update(&telegram(Variable::Suspend, 0x00)).is_empty());
        assert!(store.suspended);
        assert!(store.update(&telegram(Variable::Resume, 0x00)).is_empty());
        assert!(!store.suspended);
    }

    #[test]
    fn select_bits() {
        let mut store = ValloxStore::new();
        let changed = store.update(&telegram(Variable::Select, 0b1010_0101));
        assert_eq!(changed.len(), 8);
        assert!(store.power_state);
        assert!(!store.co2_adjust_state);
        assert!(store.humidity_adjust_state);
        assert!(!store.heating_state);
        assert!(!store.filter_guard_indicator);
        assert!(store.heating_indicator);
        assert!(!store.fault_indicator);
        assert!(store.service_reminder_indicator);

        // bit fields are notified every time
        let changed = store.update(&telegram(Variable::Select, 0b1010_0101));
        assert_eq!(changed.len(), 8);
    }

    #[test]
    fn io_port_multi_purpose2_bits() {
        let mut store = ValloxStore::new();
        let changed = store.update(&telegram(Variable::IoPortMultiPurpose2, 0b0101_0110));
        assert_eq!(changed.len(), 6);
        assert!(store.damper_motor_position);
        assert!(store.fault_signal_relay_closed);
        assert!(!store.supply_fan_off);
        assert!(store.pre_heating_on);
        assert!(!store.exhaust_fan_off);
        assert!(store.fire_place_booster_closed);
    }

    #[test]
    fn program_bits() {
        let mut store = ValloxStore::new();
        let changed = store.update(&telegram(Variable::Program, 0b1100_1010));
        assert_eq!(changed.len(), 5);
        assert_eq!(store.adjustment_interval_minutes, 10);
        assert!(!store.automatic_humidity_level_seeker_state);
        assert!(!store.boost_switch_mode);
        assert!(store.radiator_type);
        assert!(store.cascade_adjust);

        store.update(&telegram(Variable::Program2, 0x01));
        assert!(store.max_speed_limit_mode);
        store.update(&telegram(Variable::Program2, 0xFE));
        assert!(!store.max_speed_limit_mode);
    }

    #[test]
    fn post_heating() {
        let mut store = ValloxStore::new();
        assert_eq!(
            store.update(&telegram(Variable::IoPortMultiPurpose1, 0x20)),
            vec![Property::PostHeatingOn]
        );
        assert!(store.post_heating_on);
    }

    #[test]
    fn humidity_and_thresholds() {
        let mut store = ValloxStore::new();
        store.update(&telegram(Variable::Humidity, 153));
        assert!((store.humidity - 50.0).abs() < 0.01);
        store.update(&telegram(Variable::HeatingSetPoint, 0xA0));
        assert_eq!(store.heating_set_point, 20);
        store.update(&telegram(Variable::ServiceReminder, 12));
        assert_eq!(store.value(Property::ServiceReminder), Some(PropertyValue::Integer(12)));
    }

    #[test]
    fn unknown_and_uninterpreted_are_noops() {
        let mut store = ValloxStore::new();
        assert!(store.update(&telegram(Variable::Unknown(0x01), 0xFF)).is_empty());
        assert!(store.update(&telegram(Variable::Flags2, 0xFF)).is_empty());
        assert!(store.update(&telegram(Variable::Poll, 0x29)).is_empty());
        assert_eq!(store, ValloxStore::new());
    }

    #[test]
    fn every_property_except_groups_has_a_value() {
        let store = ValloxStore {
            fan_speed: Some(1),
            fan_speed_max: Some(8),
            fan_speed_min: Some(1),
            ..ValloxStore::new()
        };
        for property in Property::ALL {
            let grouped = matches!(
                property,
                Property::SelectStatus
                    | Property::Program
                    | Property::Program2
                    | Property::IoPortMultiPurpose2
            );
            assert_eq!(store.value(property).is_none(), grouped, "{property}");
        }
    }
}
