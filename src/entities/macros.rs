//! Macros for reducing boilerplate when defining entities
//!
//! These macros generate the field descriptors the marshaller walks, so an
//! entity only has to list the fields it stores.

/// Implement [`Entity`](crate::core::entity::Entity) for a struct
///
/// Each listed field is stored under its Rust name, or under the key given
/// after `=>`. Field types must implement
/// [`ToFieldValue`](crate::core::field::ToFieldValue).
///
/// # Example
/// ```rust,ignore
/// #[derive(Clone, Debug, Default, Deserialize)]
/// #[serde(default, rename_all = "camelCase")]
/// pub struct Article {
///     pub id: String,
///     pub title: String,
///     pub view_count: i64,
///     pub author: Author,
/// }
///
/// impl_entity!(Article, "articles", id: id, [
///     id,
///     title,
///     view_count => "viewCount",
///     author,
/// ]);
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $type:ident,
        $collection:expr,
        id: $id:ident,
        [ $( $field:ident $( => $key:literal )? ),* $(,)? ]
    ) => {
        impl $crate::core::entity::Entity for $type {
            fn collection_name() -> &'static str {
                $collection
            }

            fn id(&self) -> &str {
                &self.$id
            }

            fn schema() -> Vec<$crate::core::field::FieldDescriptor<Self>> {
                vec![
                    $(
                        $crate::core::field::FieldDescriptor::new(
                            $crate::__field_key!($field $(, $key)?),
                            |entity: &$type| {
                                $crate::core::field::ToFieldValue::to_field_value(&entity.$field)
                            },
                        )
                    ),*
                ]
            }
        }
    };
}

/// Implement [`ToFieldValue`](crate::core::field::ToFieldValue) for a nested
/// struct, so it can be used as an entity field (alone or in a `Vec`)
///
/// # Example
/// ```rust,ignore
/// impl_field_object!(Author, [name, email_address => "emailAddress"]);
/// ```
#[macro_export]
macro_rules! impl_field_object {
    ($type:ident, [ $( $field:ident $( => $key:literal )? ),* $(,)? ]) => {
        impl $crate::core::field::ToFieldValue for $type {
            fn to_field_value(&self) -> $crate::core::field::FieldValue {
                $crate::core::field::FieldValue::Object(vec![
                    $(
                        (
                            $crate::__field_key!($field $(, $key)?).to_string(),
                            $crate::core::field::ToFieldValue::to_field_value(&self.$field),
                        )
                    ),*
                ])
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_key {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $key:literal) => {
        $key
    };
}
