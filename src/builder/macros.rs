//! Macros for ergonomic transition tables.

/// Build a [`TransitionTable`](crate::core::TransitionTable) from
/// `source => target` rules, kept in the order written.
///
/// Sources are string literals (`"*"` and `"null"` are the wildcard and
/// empty keys). Targets are string literals, `null`, or a parenthesized
/// expression convertible into a [`Target`](crate::core::Target).
///
/// # Example
///
/// ```
/// use commonwealth::{transition_table, SourceKey, Target};
///
/// let table = transition_table! {
///     "red" => "green",
///     "green" => "yellow",
///     "yellow" => "red",
///     "*" => null,
/// };
///
/// assert_eq!(table.len(), 4);
/// assert_eq!(table.rules()[3], (SourceKey::Any, Target::None));
/// ```
#[macro_export]
macro_rules! transition_table {
    (@target null) => {
        $crate::core::Target::None
    };
    (@target $target:tt) => {
        $target
    };
    ($($source:literal => $target:tt),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut table = $crate::core::TransitionTable::new();
        $(
            table.push($source, $crate::transition_table!(@target $target));
        )*
        table
    }};
}
