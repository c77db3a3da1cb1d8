//! Record definition macro
//!
//! `define_record!` declares a record struct and generates its `Packable`
//! implementation, its `FieldValue` bridge (so it can be nested inside other
//! records) and its schema, from one declaration:
//!
//! ```rust
//! use codec::define_record;
//!
//! define_record! {
//!     /// Point in 3D space
//!     pub struct Vector3 as "Vector3" {
//!         pub x: f64,
//!         pub y: f64,
//!         pub z: f64,
//!     }
//! }
//! ```
//!
//! A field may declare a default with `= expr`; the default fills the field
//! when a decoded field map omits it, and is reported in the schema.

/// Optional default factory for a declared field or parameter
///
/// `field_default!(bool)` is `None`; `field_default!(bool, true)` is a factory
/// producing the encoded default.
#[macro_export]
macro_rules! field_default {
    ($ty:ty) => {
        ::std::option::Option::None
    };
    ($ty:ty, $default:expr) => {
        ::std::option::Option::Some(
            (|| <$ty as $crate::FieldValue>::to_value(&$default)) as fn() -> $crate::Value,
        )
    };
}

#[macro_export]
macro_rules! define_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $type_name:literal {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Packable for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn to_fields(&self) -> $crate::Fields {
                let mut fields = $crate::Fields::new();
                $(
                    fields.insert(
                        stringify!($field).to_string(),
                        $crate::FieldValue::to_value(&self.$field),
                    );
                )*
                fields
            }

            #[allow(unused_mut)]
            fn from_fields(mut fields: $crate::Fields) -> $crate::Result<Self> {
                let record = Self {
                    $(
                        $field: $crate::record::take_field::<$ty>(
                            &mut fields,
                            $type_name,
                            stringify!($field),
                            $crate::field_default!($ty $(, $default)?),
                        )?,
                    )*
                };
                $crate::record::reject_leftovers(fields, $type_name)?;
                Ok(record)
            }

            fn schema() -> $crate::RecordSchema {
                $crate::RecordSchema {
                    type_name: $type_name,
                    fields: vec![
                        $(
                            $crate::FieldSpec {
                                name: stringify!($field),
                                kind: <$ty as $crate::FieldValue>::kind(),
                                default: $crate::field_default!($ty $(, $default)?),
                            },
                        )*
                    ],
                    construct: $crate::record::construct::<$name>,
                }
            }
        }

        impl $crate::FieldValue for $name {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Record(::std::boxed::Box::new(self.clone()))
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                $crate::record::record_from_value::<$name>(value)
            }

            fn kind() -> $crate::FieldKind {
                $crate::FieldKind::Record(<$name as $crate::Packable>::schema)
            }
        }
    };
}
