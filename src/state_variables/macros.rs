/// Macro pour définir une variable d'état UPnP statique.
///
/// # Syntaxe
///
/// ```ignore
/// define_variable! {
///     pub static VOLUME: UI2 = "Volume"
/// }
///
/// define_variable! {
///     pub static TRANSPORT_STATE: String = "TransportState" {
///         allowed: ["STOPPED", "PLAYING"],
///         default: "STOPPED",
///         evented: true,
///     }
/// }
/// ```
///
/// Le type après `:` est une variante de
/// [`StateVarType`](crate::variable_types::StateVarType).
#[macro_export]
macro_rules! define_variable {
    // Variante simple
    (pub static $ident:ident : $ty:ident = $name:literal) => {
        pub static $ident: once_cell::sync::Lazy<std::sync::Arc<$crate::state_variables::StateVariable>> =
            once_cell::sync::Lazy::new(|| {
                std::sync::Arc::new($crate::state_variables::StateVariable::new(
                    $name,
                    $crate::variable_types::StateVarType::$ty,
                ))
            });
    };

    // Variante avec options
    (pub static $ident:ident : $ty:ident = $name:literal {
        $($opt:ident : $val:tt),* $(,)?
    }) => {
        pub static $ident: once_cell::sync::Lazy<std::sync::Arc<$crate::state_variables::StateVariable>> =
            once_cell::sync::Lazy::new(|| {
                let var = $crate::state_variables::StateVariable::new(
                    $name,
                    $crate::variable_types::StateVarType::$ty,
                );
                $(
                    let var = define_variable!(@opt var, $opt, $val);
                )*
                std::sync::Arc::new(var)
            });
    };

    (@opt $var:ident, allowed, [$($value:literal),* $(,)?]) => {
        $var.with_allowed_values([$($value),*])
    };
    (@opt $var:ident, default, $value:literal) => {
        $var.with_default($value).expect("invalid default value")
    };
    (@opt $var:ident, evented, $value:literal) => {
        $var.evented($value)
    };
}

#[cfg(test)]
mod tests {
    use crate::variable_types::StateVarType;

    define_variable! {
        pub static INSTANCE_ID: UI4 = "A_ARG_TYPE_InstanceID"
    }

    define_variable! {
        pub static TRANSPORT_STATE: String = "TransportState" {
            allowed: ["STOPPED", "PLAYING", "PAUSED_PLAYBACK"],
            default: "STOPPED",
            evented: true,
        }
    }

    #[test]
    fn test_simple_variable() {
        assert_eq!(INSTANCE_ID.name(), "A_ARG_TYPE_InstanceID");
        assert_eq!(INSTANCE_ID.data_type(), StateVarType::UI4);
        assert!(!INSTANCE_ID.send_events());
    }

    #[test]
    fn test_variable_with_options() {
        assert_eq!(TRANSPORT_STATE.allowed_values().unwrap().len(), 3);
        assert_eq!(
            TRANSPORT_STATE.default_value().unwrap().to_string(),
            "STOPPED"
        );
        assert!(TRANSPORT_STATE.send_events());
    }
}
