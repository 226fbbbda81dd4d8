use clap::{Args, Subcommand};

use closet_core::{Category, Item, ItemChanges, ItemInput};

use super::{confirm, describe, settle, truncate, OutputFormat};
use crate::config::Config;
use crate::engine::{resolve, Engine};

#[derive(Args)]
pub struct ItemCommand {
    #[command(subcommand)]
    pub command: ItemSubcommand,
}

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// Add an item to the wardrobe
    Add {
        /// Name of the item
        name: String,

        /// Category (top, bottom, dress, outerwear, shoes, accessory, other)
        #[arg(long, short = 'C')]
        category: Option<Category>,

        /// Color
        #[arg(long)]
        color: Option<String>,

        /// Brand
        #[arg(long)]
        brand: Option<String>,

        /// Image URL
        #[arg(long)]
        image_url: Option<String>,

        /// Tags (can be repeated)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Mark as favorite
        #[arg(long)]
        favorite: bool,
    },

    /// List items
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Filter by tag
        #[arg(long = "tag", value_name = "TAG")]
        tag: Option<String>,

        /// Filter by category
        #[arg(long, short = 'C')]
        category: Option<Category>,

        /// Only show favorites
        #[arg(long)]
        favorites: bool,

        /// Skip the server refresh and show local state
        #[arg(long)]
        cached: bool,
    },

    /// Show an item's details
    Show {
        /// Item ID or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update an existing item
    Update {
        /// Item ID or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New category
        #[arg(long, short = 'C')]
        category: Option<Category>,

        /// New color
        #[arg(long)]
        color: Option<String>,

        /// New brand
        #[arg(long)]
        brand: Option<String>,

        /// New image URL
        #[arg(long)]
        image_url: Option<String>,

        /// Add a tag (can be repeated)
        #[arg(long = "add-tag", value_name = "TAG")]
        add_tags: Vec<String>,

        /// Remove a tag (can be repeated)
        #[arg(long = "remove-tag", value_name = "TAG")]
        remove_tags: Vec<String>,
    },

    /// Mark an item as favorite
    Favorite {
        /// Item ID or name
        identifier: String,

        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },

    /// Delete an item
    Delete {
        /// Item ID or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl ItemCommand {
    pub async fn run(
        &self,
        engine: &Engine,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let owner_id = config.owner_id.value.as_str();

        match &self.command {
            ItemSubcommand::Add {
                name,
                category,
                color,
                brand,
                image_url,
                tags,
                favorite,
            } => {
                if name.trim().is_empty() {
                    return Err("Item name cannot be empty".into());
                }

                let mut input = ItemInput::new(owner_id, name.trim());
                if let Some(category) = category {
                    input = input.with_category(*category);
                }
                if let Some(color) = color {
                    input = input.with_color(color);
                }
                if let Some(brand) = brand {
                    input = input.with_brand(brand);
                }
                if let Some(url) = image_url {
                    input = input.with_image_url(url);
                }
                if !tags.is_empty() {
                    input = input.with_tags(tags.clone());
                }
                input.is_favorite = *favorite;

                let mutation = engine.items.create(input);
                let outcome = settle(engine, mutation.ticket).await;
                // once synced the temporary id is gone; show the server copy
                let item = engine.items.get(&mutation.value.id).unwrap_or_else(|| {
                    engine
                        .items
                        .cached(owner_id)
                        .into_iter()
                        .filter(|i| i.name == mutation.value.name)
                        .max_by_key(|i| i.created_at)
                        .unwrap_or(mutation.value)
                });

                println!("Added item ({}):", describe(&outcome));
                println!("{}", item);
                Ok(())
            }

            ItemSubcommand::List {
                format,
                tag,
                category,
                favorites,
                cached,
            } => {
                let items = if *cached {
                    engine.items.cached(owner_id)
                } else {
                    refresh(engine, owner_id).await
                };

                let items: Vec<Item> = items
                    .into_iter()
                    .filter(|i| category.map_or(true, |c| i.category == c))
                    .filter(|i| !favorites || i.is_favorite)
                    .filter(|i| match tag {
                        Some(tag) => i.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
                        None => true,
                    })
                    .collect();

                if items.is_empty() {
                    println!("No items found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<41}  {:<30}  {:<10}  TAGS", "ID", "NAME", "CATEGORY");
                        println!("{}", "-".repeat(100));
                        for item in &items {
                            let star = if item.is_favorite { " *" } else { "" };
                            println!(
                                "{:<41}  {:<30}  {:<10}  {}",
                                item.id.to_string(),
                                format!("{}{}", truncate(&item.name, 28), star),
                                item.category.to_string(),
                                item.tags.join(", ")
                            );
                        }
                        println!("\nTotal: {} item(s)", items.len());
                    }
                }
                Ok(())
            }

            ItemSubcommand::Show { identifier, format } => {
                let item = find(engine, owner_id, identifier)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&item)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", item);
                        println!("  Created: {}", item.created_at.format("%Y-%m-%d %H:%M"));
                        println!("  Updated: {}", item.updated_at.format("%Y-%m-%d %H:%M"));
                        if let Some(url) = &item.image_url {
                            println!("  Image:   {}", url);
                        }
                    }
                }
                Ok(())
            }

            ItemSubcommand::Update {
                identifier,
                name,
                category,
                color,
                brand,
                image_url,
                add_tags,
                remove_tags,
            } => {
                let has_updates = name.is_some()
                    || category.is_some()
                    || color.is_some()
                    || brand.is_some()
                    || image_url.is_some()
                    || !add_tags.is_empty()
                    || !remove_tags.is_empty();

                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let item = find(engine, owner_id, identifier)?;
                let mut changes = ItemChanges {
                    name: name.clone(),
                    category: *category,
                    color: color.clone(),
                    brand: brand.clone(),
                    image_url: image_url.clone(),
                    ..ItemChanges::default()
                };

                if !add_tags.is_empty() || !remove_tags.is_empty() {
                    let mut tags = item.tags.clone();
                    for tag in add_tags {
                        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                            tags.push(tag.clone());
                        }
                    }
                    for tag in remove_tags {
                        tags.retain(|t| !t.eq_ignore_ascii_case(tag));
                    }
                    changes.tags = Some(tags);
                }

                let mutation = engine.items.update(&item.id, changes)?;
                let outcome = settle(engine, mutation.ticket).await;
                println!("Updated item ({}):", describe(&outcome));
                println!("{}", mutation.value);
                Ok(())
            }

            ItemSubcommand::Favorite { identifier, off } => {
                let item = find(engine, owner_id, identifier)?;
                let mutation = engine.items.toggle_flag(&item.id, !off)?;
                let outcome = settle(engine, mutation.ticket).await;
                if *off {
                    println!("Unmarked favorite: {} ({})", item.name, describe(&outcome));
                } else {
                    println!("Marked favorite: {} ({})", item.name, describe(&outcome));
                }
                Ok(())
            }

            ItemSubcommand::Delete { identifier, force } => {
                let item = find(engine, owner_id, identifier)?;

                if !force && !confirm(&format!("Delete item '{}'?", item.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let mutation = engine.items.delete(&item.id)?;
                let outcome = settle(engine, mutation.ticket).await;
                println!("Deleted item: {} ({})", item.name, describe(&outcome));
                Ok(())
            }
        }
    }
}

/// Refreshes the local cache from the server when possible and returns it.
pub(super) async fn refresh(engine: &Engine, owner_id: &str) -> Vec<Item> {
    let mutation = engine.items.list(owner_id);
    if let closet_core::SyncOutcome::Failed(e) = mutation.ticket.settled().await {
        tracing::warn!("Item refresh failed, showing local state: {}", e);
    }
    engine.items.cached(owner_id)
}

fn find(engine: &Engine, owner_id: &str, identifier: &str) -> Result<Item, String> {
    resolve(&engine.items.cached(owner_id), identifier, |i| i.name.as_str())
        .ok_or_else(|| format!("Item not found: {}", identifier))
}
