//! Proptest strategies for tabsync types.

use proptest::prelude::*;
use tabsync_core::CommandKind;

/// Strategy for raw table keywords, version suffixes included.
pub fn keyword() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][A-Z_]{2,10}",
        "[A-Z][A-Z_]{2,10}\\.[0-9]",
        "[a-z][a-z_]{2,10}",
    ]
}

/// Strategy for application ids, occasionally empty or padded.
pub fn application_id() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Z0-9-]{1,24}",
        1 => " [a-zA-Z0-9-]{1,12} ",
        1 => Just(String::new()),
    ]
}

/// Strategy for record payloads.
pub fn payload() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,8}(,[A-Za-z0-9.]{1,8}){0,6}"
}

/// Strategy for command kinds.
pub fn command_kind() -> impl Strategy<Value = CommandKind> {
    prop_oneof![Just(CommandKind::Indexed), Just(CommandKind::Positional)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_core::{AliasTable, AppId, Keyword};

    proptest! {
        #[test]
        fn generated_keywords_normalize(raw in keyword()) {
            let keyword = Keyword::canonical(&raw, &AliasTable::new()).unwrap();
            prop_assert!(!keyword.as_str().is_empty());
            prop_assert_eq!(keyword.as_str(), keyword.as_str().to_ascii_uppercase());
        }

        #[test]
        fn generated_ids_normalize(raw in application_id()) {
            if let Some(id) = AppId::normalize(&raw) {
                prop_assert!(!id.as_str().contains(' '));
            }
        }
    }
}
