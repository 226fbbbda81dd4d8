use clap::{Args, Subcommand};

use closet_core::{EntityId, Item, Outfit, OutfitChanges, OutfitInput, SyncOutcome};

use super::item::refresh as refresh_items;
use super::{confirm, describe, settle, truncate, OutputFormat};
use crate::config::Config;
use crate::engine::{resolve, Engine};

#[derive(Args)]
pub struct OutfitCommand {
    #[command(subcommand)]
    pub command: OutfitSubcommand,
}

#[derive(Subcommand)]
pub enum OutfitSubcommand {
    /// Create an outfit from existing items
    Create {
        /// Name of the outfit
        name: String,

        /// Item ID or name (can be repeated)
        #[arg(long = "item", value_name = "ITEM")]
        items: Vec<String>,

        /// Occasion, e.g. "office"
        #[arg(long)]
        occasion: Option<String>,
    },

    /// List outfits
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Skip the server refresh and show local state
        #[arg(long)]
        cached: bool,
    },

    /// Show an outfit with its items
    Show {
        /// Outfit ID or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update an existing outfit
    Update {
        /// Outfit ID or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New occasion
        #[arg(long)]
        occasion: Option<String>,

        /// Add an item by ID or name (can be repeated)
        #[arg(long = "add-item", value_name = "ITEM")]
        add_items: Vec<String>,

        /// Remove an item by ID or name (can be repeated)
        #[arg(long = "remove-item", value_name = "ITEM")]
        remove_items: Vec<String>,
    },

    /// Mark an outfit as favorite
    Favorite {
        /// Outfit ID or name
        identifier: String,

        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },

    /// Delete an outfit
    Delete {
        /// Outfit ID or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl OutfitCommand {
    pub async fn run(
        &self,
        engine: &Engine,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let owner_id = config.owner_id.value.as_str();

        match &self.command {
            OutfitSubcommand::Create {
                name,
                items,
                occasion,
            } => {
                if name.trim().is_empty() {
                    return Err("Outfit name cannot be empty".into());
                }

                let wardrobe = engine.items.cached(owner_id);
                let item_ids = resolve_items(&wardrobe, items)?;

                let mut input = OutfitInput::new(owner_id, name.trim()).with_items(item_ids);
                if let Some(occasion) = occasion {
                    input = input.with_occasion(occasion);
                }

                let mutation = engine.outfits.create(input);
                let outcome = settle(engine, mutation.ticket).await;
                let outfit = engine.outfits.get(&mutation.value.id).unwrap_or_else(|| {
                    engine
                        .outfits
                        .cached(owner_id)
                        .into_iter()
                        .filter(|o| o.name == mutation.value.name)
                        .max_by_key(|o| o.created_at)
                        .unwrap_or(mutation.value)
                });

                println!("Created outfit ({}):", describe(&outcome));
                print!("{}", outfit);
                Ok(())
            }

            OutfitSubcommand::List { format, cached } => {
                let outfits = if *cached {
                    engine.outfits.cached(owner_id)
                } else {
                    refresh(engine, owner_id).await
                };

                if outfits.is_empty() {
                    println!("No outfits found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&outfits)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<41}  {:<30}  {:<5}  OCCASION", "ID", "NAME", "ITEMS");
                        println!("{}", "-".repeat(90));
                        for outfit in &outfits {
                            let star = if outfit.is_favorite { " *" } else { "" };
                            println!(
                                "{:<41}  {:<30}  {:<5}  {}",
                                outfit.id.to_string(),
                                format!("{}{}", truncate(&outfit.name, 28), star),
                                outfit.item_ids.len(),
                                outfit.occasion.as_deref().unwrap_or("-")
                            );
                        }
                        println!("\nTotal: {} outfit(s)", outfits.len());
                    }
                }
                Ok(())
            }

            OutfitSubcommand::Show { identifier, format } => {
                let outfit = find(engine, owner_id, identifier)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&outfit)?);
                    }
                    OutputFormat::Text => {
                        let star = if outfit.is_favorite { " *" } else { "" };
                        println!("{}  {}{}", outfit.id, outfit.name, star);
                        if let Some(occasion) = &outfit.occasion {
                            println!("  Occasion: {}", occasion);
                        }
                        let wardrobe = engine.items.cached(owner_id);
                        for id in &outfit.item_ids {
                            match wardrobe.iter().find(|i| &i.id == id) {
                                Some(item) => println!("  - {}", item),
                                None => println!("  - {} (not in local wardrobe)", id),
                            }
                        }
                    }
                }
                Ok(())
            }

            OutfitSubcommand::Update {
                identifier,
                name,
                occasion,
                add_items,
                remove_items,
            } => {
                let has_updates = name.is_some()
                    || occasion.is_some()
                    || !add_items.is_empty()
                    || !remove_items.is_empty();

                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let outfit = find(engine, owner_id, identifier)?;
                let mut changes = OutfitChanges {
                    name: name.clone(),
                    occasion: occasion.clone(),
                    ..OutfitChanges::default()
                };

                if !add_items.is_empty() || !remove_items.is_empty() {
                    let wardrobe = engine.items.cached(owner_id);
                    let mut item_ids = outfit.item_ids.clone();
                    for id in resolve_items(&wardrobe, add_items)? {
                        if !item_ids.contains(&id) {
                            item_ids.push(id);
                        }
                    }
                    let removed = resolve_items(&wardrobe, remove_items)?;
                    item_ids.retain(|id| !removed.contains(id));
                    changes.item_ids = Some(item_ids);
                }

                let mutation = engine.outfits.update(&outfit.id, changes)?;
                let outcome = settle(engine, mutation.ticket).await;
                println!("Updated outfit ({}):", describe(&outcome));
                print!("{}", mutation.value);
                Ok(())
            }

            OutfitSubcommand::Favorite { identifier, off } => {
                let outfit = find(engine, owner_id, identifier)?;
                let mutation = engine.outfits.toggle_flag(&outfit.id, !off)?;
                let outcome = settle(engine, mutation.ticket).await;
                if *off {
                    println!("Unmarked favorite: {} ({})", outfit.name, describe(&outcome));
                } else {
                    println!("Marked favorite: {} ({})", outfit.name, describe(&outcome));
                }
                Ok(())
            }

            OutfitSubcommand::Delete { identifier, force } => {
                let outfit = find(engine, owner_id, identifier)?;

                if !force && !confirm(&format!("Delete outfit '{}'?", outfit.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let mutation = engine.outfits.delete(&outfit.id)?;
                let outcome = settle(engine, mutation.ticket).await;
                println!("Deleted outfit: {} ({})", outfit.name, describe(&outcome));
                Ok(())
            }
        }
    }
}

async fn refresh(engine: &Engine, owner_id: &str) -> Vec<Outfit> {
    // outfits reference items, so keep both caches in step
    refresh_items(engine, owner_id).await;

    let mutation = engine.outfits.list(owner_id);
    if let SyncOutcome::Failed(e) = mutation.ticket.settled().await {
        tracing::warn!("Outfit refresh failed, showing local state: {}", e);
    }
    engine.outfits.cached(owner_id)
}

fn find(engine: &Engine, owner_id: &str, identifier: &str) -> Result<Outfit, String> {
    resolve(&engine.outfits.cached(owner_id), identifier, |o| o.name.as_str())
        .ok_or_else(|| format!("Outfit not found: {}", identifier))
}

fn resolve_items(wardrobe: &[Item], identifiers: &[String]) -> Result<Vec<EntityId>, String> {
    identifiers
        .iter()
        .map(|identifier| {
            resolve(wardrobe, identifier, |i| i.name.as_str())
                .map(|item| item.id)
                .ok_or_else(|| format!("Item not found: {}", identifier))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use closet_core::{ItemInput, SyncEntity};

    #[test]
    fn test_resolve_items_by_name_and_id() {
        let wardrobe = vec![
            Item::from_input(EntityId::persisted("1"), &ItemInput::new("me", "Shirt")),
            Item::from_input(EntityId::persisted("2"), &ItemInput::new("me", "Jeans")),
        ];

        let ids = resolve_items(&wardrobe, &["jeans".to_string(), "1".to_string()]).unwrap();
        assert_eq!(ids, vec![EntityId::persisted("2"), EntityId::persisted("1")]);

        let err = resolve_items(&wardrobe, &["Scarf".to_string()]).unwrap_err();
        assert_eq!(err, "Item not found: Scarf");
    }
}
