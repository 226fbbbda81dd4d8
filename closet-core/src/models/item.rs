use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;
use super::entity::SyncEntity;
use super::entity_id::EntityId;

/// A single piece of clothing in a user's wardrobe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: EntityId,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemInput {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl ItemInput {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
            category: Category::default(),
            color: None,
            brand: None,
            image_url: None,
            tags: Vec::new(),
            is_favorite: false,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Partial update of an item. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl ItemChanges {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl SyncEntity for Item {
    type Input = ItemInput;
    type Changes = ItemChanges;

    const ENTITY_TYPE: &'static str = "item";
    const COLLECTION: &'static str = "items";

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

    fn from_input(id: EntityId, input: &ItemInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id: input.owner_id.clone(),
            name: input.name.clone(),
            category: input.category,
            color: input.color.clone(),
            brand: input.brand.clone(),
            image_url: input.image_url.clone(),
            tags: input.tags.clone(),
            is_favorite: input.is_favorite,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_changes(&mut self, changes: &ItemChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(color) = &changes.color {
            self.color = Some(color.clone());
        }
        if let Some(brand) = &changes.brand {
            self.brand = Some(brand.clone());
        }
        if let Some(url) = &changes.image_url {
            self.image_url = Some(url.clone());
        }
        if let Some(tags) = &changes.tags {
            self.tags = tags.clone();
        }
        if let Some(flag) = changes.is_favorite {
            self.is_favorite = flag;
        }
        self.updated_at = Utc::now();
    }

    fn flag_changes(value: bool) -> ItemChanges {
        ItemChanges {
            is_favorite: Some(value),
            ..ItemChanges::default()
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let star = if self.is_favorite { " *" } else { "" };
        write!(f, "{}  {} [{}]{}", self.id, self.name, self.category, star)?;
        if let Some(color) = &self.color {
            write!(f, " {}", color)?;
        }
        if let Some(brand) = &self.brand {
            write!(f, " ({})", brand)?;
        }
        if !self.tags.is_empty() {
            write!(f, " #{}", self.tags.join(" #"))?;
        }
        Ok(())
    }
}
