//! # Module variable_types - Types de données UPnP
//!
//! Registre statique des types de données UPnP 1.0 et de leurs valeurs
//! typées. C'est par ce module que passent toutes les conversions
//! chaîne ↔ valeur : arguments SOAP entrants, valeurs par défaut des
//! variables d'état, et sérialisation vers le format câble.
//!
//! ## Fonctionnalités
//!
//! - ✅ Les 23 jetons de type UPnP (`ui4`, `string`, `boolean`, ...)
//! - ✅ Coercition chaîne → valeur typée avec validation
//! - ✅ Sérialisation vers la forme câble (`boolean` → `0`/`1`)

mod display;
mod errors;
mod fromstr;
mod parse;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use url::Url;
use uuid::Uuid;

pub use errors::StateValueError;

/// Jeton de type de données UPnP 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVarType {
    UI1,        // Unsigned 8-bit integer
    UI2,        // Unsigned 16-bit integer
    UI4,        // Unsigned 32-bit integer
    I1,         // Signed 8-bit integer
    I2,         // Signed 16-bit integer
    I4,         // Signed 32-bit integer
    Int,        // Synonymous with i4
    R4,         // 32-bit floating point
    R8,         // 64-bit floating point
    Number,     // Synonymous with r8
    Fixed14_4,  // Fixed-point decimal
    Char,       // Single Unicode character
    String,     // Character string
    Boolean,    // Boolean value
    BinBase64,  // Base64-encoded binary
    BinHex,     // Hex-encoded binary
    Date,       // Date (YYYY-MM-DD)
    DateTime,   // DateTime without timezone
    DateTimeTZ, // DateTime with timezone
    Time,       // Time without timezone
    TimeTZ,     // Time with timezone
    UUID,       // Universally unique identifier
    URI,        // Uniform Resource Identifier
}

impl StateVarType {
    /// Vrai pour les types admis dans une `<allowedValueRange>` : les
    /// bornes et le pas d'une plage sont nécessairement numériques.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            StateVarType::UI1
                | StateVarType::UI2
                | StateVarType::UI4
                | StateVarType::I1
                | StateVarType::I2
                | StateVarType::I4
                | StateVarType::Int
                | StateVarType::R4
                | StateVarType::R8
                | StateVarType::Number
                | StateVarType::Fixed14_4
        )
    }
}

/// Valeur typée portée par une variable d'état ou un argument d'action.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    UI1(u8),
    UI2(u16),
    UI4(u32),
    I1(i8),
    I2(i16),
    I4(i32),
    Int(i32),
    R4(f32),
    R8(f64),
    Number(f64),
    Fixed14_4(f64),
    Char(char),
    String(String),
    Boolean(bool),
    BinBase64(String),
    BinHex(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeTZ(DateTime<FixedOffset>),
    Time(NaiveTime),
    TimeTZ(DateTime<FixedOffset>),
    UUID(Uuid),
    URI(Url),
}

impl StateValue {
    /// Retourne le type UPnP de cette valeur.
    pub fn var_type(&self) -> StateVarType {
        match self {
            StateValue::UI1(_) => StateVarType::UI1,
            StateValue::UI2(_) => StateVarType::UI2,
            StateValue::UI4(_) => StateVarType::UI4,
            StateValue::I1(_) => StateVarType::I1,
            StateValue::I2(_) => StateVarType::I2,
            StateValue::I4(_) => StateVarType::I4,
            StateValue::Int(_) => StateVarType::Int,
            StateValue::R4(_) => StateVarType::R4,
            StateValue::R8(_) => StateVarType::R8,
            StateValue::Number(_) => StateVarType::Number,
            StateValue::Fixed14_4(_) => StateVarType::Fixed14_4,
            StateValue::Char(_) => StateVarType::Char,
            StateValue::String(_) => StateVarType::String,
            StateValue::Boolean(_) => StateVarType::Boolean,
            StateValue::BinBase64(_) => StateVarType::BinBase64,
            StateValue::BinHex(_) => StateVarType::BinHex,
            StateValue::Date(_) => StateVarType::Date,
            StateValue::DateTime(_) => StateVarType::DateTime,
            StateValue::DateTimeTZ(_) => StateVarType::DateTimeTZ,
            StateValue::Time(_) => StateVarType::Time,
            StateValue::TimeTZ(_) => StateVarType::TimeTZ,
            StateValue::UUID(_) => StateVarType::UUID,
            StateValue::URI(_) => StateVarType::URI,
        }
    }
}
