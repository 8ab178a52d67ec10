//! Domain types shared by the stores and the gateway contract.

pub mod item;
pub mod suggestion;

pub use item::{
    Context, DisplayHint, ItemDraft, NewPrepItem, ParseEnumError, PrepItem, PrepItemPatch,
    PrepItemRecord, PrepItemRow, Status, format_quantity_raw,
};
pub use suggestion::{KitchenItem, NewDismissal, Suggestion, SuggestionRanker, SuggestionRow, Unit};
