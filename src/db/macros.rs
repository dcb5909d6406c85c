/// Append `column = ?N` to a dynamic SET clause and bind the value, but only
/// when the optional field is present. `N` is the bound value's 1-based
/// position in `params`.
///
/// ```ignore
/// push_field!(input.title, "title", sets, params);
/// ```
#[macro_export]
macro_rules! push_field {
    ($field:expr, $col:literal, $sets:ident, $params:ident) => {
        if let Some(value) = &$field {
            $params.push(Box::new(value.clone()));
            $sets.push(format!("{} = ?{}", $col, $params.len()));
        }
    };
}
