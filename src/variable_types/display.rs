//! Affichage des jetons de type et forme câble des valeurs.

use crate::variable_types::{StateValue, StateVarType};
use std::fmt;

impl fmt::Display for StateVarType {
    /// Émet le jeton tel qu'il apparaît dans un élément `<dataType>`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            StateVarType::UI1 => "ui1",
            StateVarType::UI2 => "ui2",
            StateVarType::UI4 => "ui4",
            StateVarType::I1 => "i1",
            StateVarType::I2 => "i2",
            StateVarType::I4 => "i4",
            StateVarType::Int => "int",
            StateVarType::R4 => "r4",
            StateVarType::R8 => "r8",
            StateVarType::Number => "number",
            StateVarType::Fixed14_4 => "fixed.14.4",
            StateVarType::Char => "char",
            StateVarType::String => "string",
            StateVarType::Boolean => "boolean",
            StateVarType::BinBase64 => "bin.base64",
            StateVarType::BinHex => "bin.hex",
            StateVarType::Date => "date",
            StateVarType::DateTime => "dateTime",
            StateVarType::DateTimeTZ => "dateTime.tz",
            StateVarType::Time => "time",
            StateVarType::TimeTZ => "time.tz",
            StateVarType::UUID => "uuid",
            StateVarType::URI => "uri",
        };
        f.write_str(token)
    }
}

impl fmt::Display for StateValue {
    /// Forme câble de la valeur, telle qu'émise dans une réponse SOAP
    /// ou une valeur par défaut de SCPD. Les booléens sortent toujours
    /// en `0`/`1`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateValue::UI1(v) => write!(f, "{}", v),
            StateValue::UI2(v) => write!(f, "{}", v),
            StateValue::UI4(v) => write!(f, "{}", v),
            StateValue::I1(v) => write!(f, "{}", v),
            StateValue::I2(v) => write!(f, "{}", v),
            StateValue::I4(v) | StateValue::Int(v) => write!(f, "{}", v),
            StateValue::R4(v) => write!(f, "{}", v),
            StateValue::R8(v) | StateValue::Number(v) => write!(f, "{}", v),
            StateValue::Fixed14_4(v) => write!(f, "{:.4}", v),
            StateValue::Char(c) => write!(f, "{}", c),
            StateValue::String(s) => f.write_str(s),
            StateValue::Boolean(b) => f.write_str(if *b { "1" } else { "0" }),
            StateValue::BinBase64(s) | StateValue::BinHex(s) => f.write_str(s),
            StateValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            StateValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            StateValue::DateTimeTZ(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            StateValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            StateValue::TimeTZ(dt) => write!(f, "{}", dt.format("%H:%M:%S%:z")),
            StateValue::UUID(u) => write!(f, "{}", u.hyphenated()),
            StateValue::URI(u) => f.write_str(u.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_wire_form() {
        assert_eq!(StateValue::Boolean(true).to_string(), "1");
        assert_eq!(StateValue::Boolean(false).to_string(), "0");
    }

    #[test]
    fn test_fixed_14_4_wire_form() {
        assert_eq!(StateValue::Fixed14_4(3.5).to_string(), "3.5000");
    }

    #[test]
    fn test_type_token_round_trip() {
        for token in ["ui1", "int", "bin.base64", "dateTime.tz", "uri"] {
            let ty: StateVarType = token.parse().unwrap();
            assert_eq!(ty.to_string(), token);
        }
    }
}
