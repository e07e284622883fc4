//! Value conversions between raw telegram arguments and physical units.
//!
//! The unit reports temperatures through an NTC lookup table, fan speeds as a
//! bit mask with one more bit set per level and relative humidity through a
//! linear formula.

use crate::Error;

/// Raw telegram argument to degrees Celsius.
#[rustfmt::skip]
pub const TEMPERATURE_MAPPING: [i8; 256] = [
    -74, -70, -66, -62, -59, -56, -54, -52, -50, -48, // 0x00 - 0x09
    -47, -46, -44, -43, -42, -41, -40, -39, -38, -37, // 0x0a - 0x13
    -36, -35, -34, -33, -33, -32, -31, -30, -30, -29, // 0x14 - 0x1d
    -28, -28, -27, -27, -26, -25, -25, -24, -24, -23, // 0x1e - 0x27
    -23, -22, -22, -21, -21, -20, -20, -19, -19, -19, // 0x28 - 0x31
    -18, -18, -17, -17, -16, -16, -16, -15, -15, -14, // 0x32 - 0x3b
    -14, -14, -13, -13, -12, -12, -12, -11, -11, -11, // 0x3c - 0x45
    -10, -10,  -9,  -9,  -9,  -8,  -8,  -8,  -7,  -7, // 0x46 - 0x4f
     -7,  -6,  -6,  -6,  -5,  -5,  -5,  -4,  -4,  -4, // 0x50 - 0x59
     -3,  -3,  -3,  -2,  -2,  -2,  -1,  -1,  -1,  -1, // 0x5a - 0x63
      0,   0,   0,   1,   1,   1,   2,   2,   2,   3, // 0x64 - 0x6d
      3,   3,   4,   4,   4,   5,   5,   5,   5,   6, // 0x6e - 0x77
      6,   6,   7,   7,   7,   8,   8,   8,   9,   9, // 0x78 - 0x81
      9,  10,  10,  10,  11,  11,  11,  12,  12,  12, // 0x82 - 0x8b
     13,  13,  13,  14,  14,  14,  15,  15,  15,  16, // 0x8c - 0x95
     16,  16,  17,  17,  18,  18,  18,  19,  19,  19, // 0x96 - 0x9f
     20,  20,  21,  21,  21,  22,  22,  22,  23,  23, // 0xa0 - 0xa9
     24,  24,  24,  25,  25,  26,  26,  27,  27,  27, // 0xaa - 0xb3
     28,  28,  29,  29,  30,  30,  31,  31,  32,  32, // 0xb4 - 0xbd
     33,  33,  34,  34,  35,  35,  36,  36,  37,  37, // 0xbe - 0xc7
     38,  38,  39,  40,  40,  41,  41,  42,  43,  43, // 0xc8 - 0xd1
     44,  45,  45,  46,  47,  48,  48,  49,  50,  51, // 0xd2 - 0xdb
     52,  53,  53,  54,  55,  56,  57,  59,  60,  61, // 0xdc - 0xe5
     62,  63,  65,  66,  68,  69,  71,  73,  75,  77, // 0xe6 - 0xef
     79,  81,  82,  86,  90,  93,  97, 100, 100, 100, // 0xf0 - 0xf9
    100, 100, 100, 100, 100, 100,                     // 0xfa - 0xff
];

/// Fan speed level `n` (1-8) is encoded as `FAN_SPEED_MAPPING[n - 1]`.
pub const FAN_SPEED_MAPPING: [u8; 8] = [0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3F, 0x7F, 0xFF];

/// Argument written when no table entry reaches the requested temperature (0 °C).
pub const DEFAULT_TEMPERATURE_ARGUMENT: u8 = 0x64;

pub fn convert_temperature(value: u8) -> i8 {
    TEMPERATURE_MAPPING[usize::from(value)]
}

/// Returns the first argument whose temperature is at least `temperature`.
///
/// The table is coarse, so the result is only approximate; above the top of
/// the scale [`DEFAULT_TEMPERATURE_ARGUMENT`] is returned.
pub fn convert_back_temperature(temperature: i8) -> u8 {
    TEMPERATURE_MAPPING
        .iter()
        .position(|&t| t >= temperature)
        .map(|index| index as u8)
        .unwrap_or(DEFAULT_TEMPERATURE_ARGUMENT)
}

/// Decodes a fan speed bit mask to its level 1-8.
///
/// Returns `None` if the argument is not one of the eight known masks.
pub fn convert_fan_speed(value: u8) -> Option<u8> {
    FAN_SPEED_MAPPING
        .iter()
        .position(|&mask| mask == value)
        .map(|index| index as u8 + 1)
}

pub fn convert_back_fan_speed(level: u8) -> Result<u8, Error> {
    match level {
        1..=8 => Ok(FAN_SPEED_MAPPING[usize::from(level - 1)]),
        _ => Err(Error::RangeError),
    }
}

/// Relative humidity in percent.
pub fn convert_humidity(value: u8) -> f32 {
    (f32::from(value) - 51.0) / 2.04
}

/// Merges two separately transmitted bytes of a composite value.
///
/// The unit sends each half as a byte whose two-digit hex representation is
/// concatenated and read back as one hexadecimal number, e.g. `0x32` and
/// `0x07` give `0x3207`.
pub fn merge_hex_pair(high: u8, low: u8) -> Result<u16, Error> {
    let digits = byte_to_hex(high) + &byte_to_hex(low);
    u16::from_str_radix(&digits, 16).map_err(|_| Error::CompositeDecode { high, low })
}

/// Two digit uppercase hex representation of one byte.
pub fn byte_to_hex(value: u8) -> String {
    format!("{value:02X}")
}

pub fn bytes_to_hex(values: &[u8]) -> String {
    values.iter().map(|b| byte_to_hex(*b)).collect()
}
