//! Capability flags negotiated with the native health store

use serde::{Deserialize, Serialize};

/// What the bridge is currently permitted to do against the native store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_read_steps: bool,
    pub can_read_active_calories: bool,
    pub can_write_nutrition: bool,
}

impl Capabilities {
    /// No capability granted
    pub const fn none() -> Self {
        Self {
            can_read_steps: false,
            can_read_active_calories: false,
            can_write_nutrition: false,
        }
    }

    /// Both reads granted, write as given
    pub const fn reads(can_write_nutrition: bool) -> Self {
        Self {
            can_read_steps: true,
            can_read_active_calories: true,
            can_write_nutrition,
        }
    }

    /// OR-combines two capability sets
    ///
    /// A flag that was once proven true stays true; observations that simply
    /// did not exercise a capability never downgrade it.
    #[must_use]
    pub fn merge(self, observed: Capabilities) -> Self {
        Self {
            can_read_steps: self.can_read_steps || observed.can_read_steps,
            can_read_active_calories: self.can_read_active_calories
                || observed.can_read_active_calories,
            can_write_nutrition: self.can_write_nutrition || observed.can_write_nutrition,
        }
    }

    /// Returns true if at least one flag is set
    pub fn any(&self) -> bool {
        self.can_read_steps || self.can_read_active_calories || self.can_write_nutrition
    }
}
