//! Macros for ergonomic state machine construction.

/// Declare a closed set of states and implement [`State`](crate::core::State) for it.
///
/// The enum gets the derives a state needs (`Clone`, `Eq`, `Hash`, `Debug`
/// and serde), and each variant's name is its identifier.
///
/// # Example
///
/// ```
/// use gambit::core::State;
/// use gambit::state_enum;
///
/// state_enum! {
///     pub enum Shopper {
///         Register,
///         GetProfile,
///         Browse,
///         Shop,
///         Logout,
///     }
/// }
///
/// assert_eq!(Shopper::GetProfile.name(), "GetProfile");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}
