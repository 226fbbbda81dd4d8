use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::SyncEntity;
use super::entity_id::EntityId;

/// A named combination of wardrobe items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outfit {
    pub id: EntityId,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub item_ids: Vec<EntityId>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutfitInput {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub item_ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl OutfitInput {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
            item_ids: Vec::new(),
            occasion: None,
            is_favorite: false,
        }
    }

    pub fn with_items(mut self, item_ids: Vec<EntityId>) -> Self {
        self.item_ids = item_ids;
        self
    }

    pub fn with_occasion(mut self, occasion: impl Into<String>) -> Self {
        self.occasion = Some(occasion.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutfitChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_ids: Option<Vec<EntityId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl SyncEntity for Outfit {
    type Input = OutfitInput;
    type Changes = OutfitChanges;

    const ENTITY_TYPE: &'static str = "outfit";
    const COLLECTION: &'static str = "outfits";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_input(id: EntityId, input: &OutfitInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id: input.owner_id.clone(),
            name: input.name.clone(),
            item_ids: input.item_ids.clone(),
            occasion: input.occasion.clone(),
            is_favorite: input.is_favorite,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_changes(&mut self, changes: &OutfitChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(ids) = &changes.item_ids {
            self.item_ids = ids.clone();
        }
        if let Some(occasion) = &changes.occasion {
            self.occasion = Some(occasion.clone());
        }
        if let Some(flag) = changes.is_favorite {
            self.is_favorite = flag;
        }
        self.updated_at = Utc::now();
    }

    fn flag_changes(value: bool) -> OutfitChanges {
        OutfitChanges {
            is_favorite: Some(value),
            ..OutfitChanges::default()
        }
    }
}

impl fmt::Display for Outfit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let star = if self.is_favorite { " *" } else { "" };
        writeln!(f, "{}  {}{}", self.id, self.name, star)?;
        if let Some(occasion) = &self.occasion {
            writeln!(f, "  Occasion: {}", occasion)?;
        }
        for id in &self.item_ids {
            writeln!(f, "  - {}", id)?;
        }
        Ok(())
    }
}
