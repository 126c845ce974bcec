//! Coercition des chaînes câble vers des valeurs typées.
//!
//! UPnP transporte tous les arguments sous forme de texte ; la
//! coercition vers le type déclaré par la variable d'état associée se
//! fait ici. L'échec de coercition côté serveur se traduit par un fault
//! SOAP `402 Invalid Args`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::variable_types::{StateValue, StateValueError, StateVarType};

/// UUID canonique : 32 hexadécimaux minuscules avec tirets.
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f\d]{8}-[a-f\d]{4}-[a-f\d]{4}-[a-f\d]{4}-[a-f\d]{12}$").unwrap()
});

impl StateVarType {
    /// Convertit une chaîne câble (déjà extraite du XML) vers une valeur
    /// du type `self`. Les blancs de tête et de queue sont tolérés.
    pub fn parse_value(&self, raw: &str) -> Result<StateValue, StateValueError> {
        let s = raw.trim();
        match self {
            StateVarType::UI1 => parse_num(s, "ui1", StateValue::UI1),
            StateVarType::UI2 => parse_num(s, "ui2", StateValue::UI2),
            StateVarType::UI4 => parse_num(s, "ui4", StateValue::UI4),
            StateVarType::I1 => parse_num(s, "i1", StateValue::I1),
            StateVarType::I2 => parse_num(s, "i2", StateValue::I2),
            StateVarType::I4 => parse_num(s, "i4", StateValue::I4),
            StateVarType::Int => parse_num(s, "int", StateValue::Int),
            StateVarType::R4 => parse_num(s, "r4", StateValue::R4),
            StateVarType::R8 => parse_num(s, "r8", StateValue::R8),
            StateVarType::Number => parse_num(s, "number", StateValue::Number),
            StateVarType::Fixed14_4 => parse_num(s, "fixed.14.4", StateValue::Fixed14_4),
            StateVarType::Char => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(StateValue::Char(c)),
                    _ => Err(StateValueError::invalid(
                        "char",
                        raw,
                        "expected exactly one character",
                    )),
                }
            }
            // La chaîne est conservée telle quelle, blancs compris
            StateVarType::String => Ok(StateValue::String(raw.to_string())),
            StateVarType::Boolean => match s.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(StateValue::Boolean(true)),
                "0" | "false" | "no" => Ok(StateValue::Boolean(false)),
                _ => Err(StateValueError::invalid(
                    "boolean",
                    raw,
                    "expected 0|1|true|false|yes|no",
                )),
            },
            StateVarType::BinBase64 => {
                BASE64
                    .decode(s)
                    .map_err(|e| StateValueError::invalid("bin.base64", raw, e.to_string()))?;
                Ok(StateValue::BinBase64(s.to_string()))
            }
            StateVarType::BinHex => {
                if s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                    Ok(StateValue::BinHex(s.to_string()))
                } else {
                    Err(StateValueError::invalid(
                        "bin.hex",
                        raw,
                        "expected an even number of hex digits",
                    ))
                }
            }
            StateVarType::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(StateValue::Date)
                .map_err(|e| StateValueError::invalid("date", raw, e.to_string())),
            StateVarType::DateTime => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(StateValue::DateTime)
                .map_err(|e| StateValueError::invalid("dateTime", raw, e.to_string())),
            StateVarType::DateTimeTZ => DateTime::parse_from_rfc3339(s)
                .map(StateValue::DateTimeTZ)
                .map_err(|e| StateValueError::invalid("dateTime.tz", raw, e.to_string())),
            StateVarType::Time => NaiveTime::parse_from_str(s, "%H:%M:%S")
                .map(StateValue::Time)
                .map_err(|e| StateValueError::invalid("time", raw, e.to_string())),
            StateVarType::TimeTZ => {
                // chrono ne parse pas une heure + offset sans date : on
                // ancre sur l'époque, seul le couple heure/offset compte.
                DateTime::parse_from_str(&format!("1970-01-01T{}", s), "%Y-%m-%dT%H:%M:%S%:z")
                    .map(StateValue::TimeTZ)
                    .map_err(|e| StateValueError::invalid("time.tz", raw, e.to_string()))
            }
            StateVarType::UUID => {
                let stripped: String = s.chars().filter(|c| !c.is_whitespace()).collect();
                if !UUID_RE.is_match(&stripped) {
                    return Err(StateValueError::invalid(
                        "uuid",
                        raw,
                        "expected hyphenated lowercase hex uuid",
                    ));
                }
                Uuid::parse_str(&stripped)
                    .map(StateValue::UUID)
                    .map_err(|e| StateValueError::invalid("uuid", raw, e.to_string()))
            }
            StateVarType::URI => Url::parse(s)
                .map(StateValue::URI)
                .map_err(|e| StateValueError::invalid("uri", raw, e.to_string())),
        }
    }
}

fn parse_num<T, F>(s: &str, token: &'static str, wrap: F) -> Result<StateValue, StateValueError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: FnOnce(T) -> StateValue,
{
    s.parse::<T>()
        .map(wrap)
        .map_err(|e| StateValueError::invalid(token, s, e.to_string()))
}
