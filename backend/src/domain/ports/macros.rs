//! `define_port_error!`: declares a `thiserror` enum for a port and a
//! snake_case constructor per variant whose fields accept `impl Into<T>`.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum LedgerPortError {
            Unreachable { message: String } => "ledger unreachable: {message}",
            Lagging { seconds: u32 } => "ledger lagging by {seconds}s",
            Partial { message: String, missing: u32 } => "partial read: {message} ({missing} rows missing)",
            Closed => "ledger closed",
        }
    }

    #[test]
    fn string_fields_accept_str() {
        let err = LedgerPortError::unreachable("refused");
        assert_eq!(err.to_string(), "ledger unreachable: refused");
    }

    #[test]
    fn numeric_fields_keep_their_type() {
        assert_eq!(LedgerPortError::lagging(3_u32).to_string(), "ledger lagging by 3s");
    }

    #[test]
    fn mixed_and_unit_variants_get_constructors() {
        let err = LedgerPortError::partial("xp_events", 2_u32);
        assert_eq!(err.to_string(), "partial read: xp_events (2 rows missing)");
        assert_eq!(LedgerPortError::closed(), LedgerPortError::Closed);
    }
}
