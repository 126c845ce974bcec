/// Macro pour définir une action UPnP statique.
///
/// # Syntaxe
///
/// ```ignore
/// define_action! {
///     pub static PLAY = "Play" {
///         in "InstanceID" => A_ARG_TYPE_INSTANCE_ID,
///         in "Speed" => TRANSPORT_PLAY_SPEED,
///     }
/// }
///
/// define_action! {
///     pub static GET_TIME = "GetTime" {
///         retval "CurrentTime" => CURRENT_TIME,
///     }
/// }
/// ```
///
/// Les références à droite de `=>` sont des variables d'état définies
/// avec [`define_variable!`](crate::define_variable).
#[macro_export]
macro_rules! define_action {
    // Variante sans arguments
    (pub static $ident:ident = $name:literal) => {
        pub static $ident: once_cell::sync::Lazy<$crate::actions::Action> =
            once_cell::sync::Lazy::new(|| $crate::actions::Action::new($name));
    };

    // Variante avec arguments
    (pub static $ident:ident = $name:literal {
        $(
            $direction:ident $arg_name:literal => $var_ref:expr
        ),* $(,)?
    }) => {
        pub static $ident: once_cell::sync::Lazy<$crate::actions::Action> =
            once_cell::sync::Lazy::new(|| {
                let mut action = $crate::actions::Action::new($name);
                $(
                    action.add_argument(define_action!(@arg $direction $arg_name, $var_ref));
                )*
                action
            });
    };

    (@arg in $name:literal, $var:expr) => {
        $crate::actions::Argument::new_in($name, &$var)
    };
    (@arg out $name:literal, $var:expr) => {
        $crate::actions::Argument::new_out($name, &$var)
    };
    (@arg retval $name:literal, $var:expr) => {
        $crate::actions::Argument::new_retval($name, &$var)
    };
}

#[cfg(test)]
mod tests {
    use crate::actions::Direction;
    use crate::define_variable;

    define_variable! {
        pub static INSTANCE_ID: UI4 = "A_ARG_TYPE_InstanceID"
    }

    define_variable! {
        pub static SPEED: String = "TransportPlaySpeed" {
            default: "1",
        }
    }

    define_action! {
        pub static PLAY = "Play" {
            in "InstanceID" => INSTANCE_ID,
            in "Speed" => SPEED,
        }
    }

    define_action! {
        pub static PAUSE = "Pause"
    }

    #[test]
    fn test_action_macro() {
        assert_eq!(PLAY.name(), "Play");
        assert_eq!(PLAY.arguments().len(), 2);
        assert_eq!(PLAY.arguments()[0].name(), "InstanceID");
        assert_eq!(
            PLAY.arguments()[0].related_state_variable(),
            "A_ARG_TYPE_InstanceID"
        );
        assert_eq!(PLAY.arguments()[1].direction(), Direction::In);
    }

    #[test]
    fn test_action_macro_no_args() {
        assert_eq!(PAUSE.name(), "Pause");
        assert!(PAUSE.arguments().is_empty());
    }
}
