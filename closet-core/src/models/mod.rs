mod category;
mod entity;
mod entity_id;
mod item;
mod outfit;

pub use category::Category;
pub use entity::SyncEntity;
pub use entity_id::{EntityId, TEMP_PREFIX};
pub use item::{Item, ItemChanges, ItemInput};
pub use outfit::{Outfit, OutfitChanges, OutfitInput};
