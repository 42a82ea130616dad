// SPDX-License-Identifier: MIT

//! Edit flags accepted by `set_item` / `delete_item` (§4.3).

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Flags attached to a single edit-log entry, and echoed into the
    /// operation log so replay (§4.5, §9) applies the same semantics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EditFlags: u8 {
        /// `set_item`: fail if the node already exists.
        /// `delete_item`: fail if the node is absent.
        const STRICT = 0b0000_0001;
        /// `set_item` only: do not auto-create missing ancestor containers/lists.
        const NON_RECURSIVE = 0b0000_0010;
        /// Mark the written value as schema-default rather than user-set,
        /// so it doesn't shadow a later `default` statement change.
        const DEFAULT = 0b0000_0100;
    }
}

impl Default for EditFlags {
    fn default() -> Self {
        EditFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test_independently() {
        let f = EditFlags::STRICT | EditFlags::NON_RECURSIVE;
        assert!(f.contains(EditFlags::STRICT));
        assert!(f.contains(EditFlags::NON_RECURSIVE));
        assert!(!f.contains(EditFlags::DEFAULT));
    }

    #[test]
    fn default_is_empty() {
        assert_eq!(EditFlags::default(), EditFlags::empty());
    }
}
