// ============================================================================
// FLIP STATE — gesture lifecycle and page layout mode
// ============================================================================
//
//   END_FLIP ──down──▶ BEGIN_FLIP ──move──▶ FORWARD / BACKWARD
//      ▲                   │                    │      ▲
//      │                  up                    up     │ (backward released
//      │                   │                    ▼      │  early turns forward)
//      └──── settle ◀── END_WITH_* ◀──abort── animating / RESTORE
// ============================================================================

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlipState {
    BeginFlip,
    ForwardFlip,
    BackwardFlip,
    RestoreFlip,
    #[default]
    EndFlip,
    EndWithForward,
    EndWithBackward,
    EndWithRestore,
}

impl FlipState {
    /// No gesture in progress.
    pub fn is_idle(self) -> bool {
        self == FlipState::EndFlip
    }

    /// A gesture finished and awaits its page commit.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlipState::EndWithForward | FlipState::EndWithBackward | FlipState::EndWithRestore
        )
    }

    /// The fold is moving, under the finger or the scroller.
    pub fn is_flipping(self) -> bool {
        matches!(
            self,
            FlipState::ForwardFlip | FlipState::BackwardFlip | FlipState::RestoreFlip
        )
    }

    /// Terminal state an in-flight flip ends in, if any.
    pub fn aborted(self) -> Option<FlipState> {
        match self {
            FlipState::ForwardFlip => Some(FlipState::EndWithForward),
            FlipState::BackwardFlip => Some(FlipState::EndWithBackward),
            FlipState::RestoreFlip => Some(FlipState::EndWithRestore),
            _ => None,
        }
    }
}

/// How many pages share the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    /// One page covering the whole surface.
    #[default]
    Single,
    /// Two pages on a landscape surface, one otherwise.
    Auto,
}

impl PageMode {
    pub fn from_auto_page(enabled: bool) -> Self {
        if enabled { PageMode::Auto } else { PageMode::Single }
    }

    /// Whether a `width`×`height` surface is split into two pages.
    pub fn is_double(self, width: u32, height: u32) -> bool {
        self == PageMode::Auto && width > height
    }
}
