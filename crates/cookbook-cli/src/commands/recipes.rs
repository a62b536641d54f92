//! Catalog browsing commands: search, table of contents, recipe detail.

use anyhow::{bail, Result};
use tracing::debug;

use cookbook_core::search::{result_summary, table_of_contents};
use cookbook_core::{filter_recipes, Catalog, Config, Recipe, SearchQuery};

use crate::cli::{SearchArgs, ShowArgs};

/// Characters of body text shown under each search result
const PREVIEW_LENGTH: usize = 120;

async fn load_catalog(config: &Config) -> Result<Catalog> {
    let source = config.catalog_source()?;
    debug!(source = %source, "Loading catalog");
    Ok(Catalog::load(&source).await)
}

pub fn build_query(args: &SearchArgs) -> SearchQuery {
    let mut query = SearchQuery::new()
        .text(args.query.clone().unwrap_or_default())
        .temperature(args.min_temp, args.max_temp)
        .time(args.min_time, args.max_time);
    if let Some(ref section) = args.section {
        query = query.section(section.as_str());
    }
    if let Some(ref protein) = args.protein {
        query = query.protein(protein.as_str());
    }
    if let Some(ref method) = args.method {
        query = query.cooking_method(method.as_str());
    }
    query
}

/// One result entry: title line, metadata line, preview
pub fn format_card(recipe: &Recipe) -> String {
    let mut out = recipe.title.clone();
    if let Some(badge) = recipe.display_badge() {
        out.push_str(&format!(" [{}]", badge));
    }
    out.push_str(&format!("  ({})\n", recipe.id));

    let meta: Vec<String> = [
        Some(recipe.section_name.clone()),
        recipe.protein_display().map(str::to_string),
        recipe.temperature_display(),
        recipe.time_display(),
    ]
    .into_iter()
    .flatten()
    .collect();
    out.push_str(&format!("  {}\n", meta.join(" · ")));
    out.push_str(&format!("  {}", recipe.preview(PREVIEW_LENGTH)));
    out
}

pub async fn search(config: &Config, args: &SearchArgs) -> Result<()> {
    let catalog = load_catalog(config).await?;
    if !catalog.is_loaded() {
        eprintln!("Recipes could not be loaded.");
        return Ok(());
    }

    let query = build_query(args);
    let results = filter_recipes(catalog.recipes(), &query);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{}", result_summary(results.len()));
    if results.is_empty() {
        println!("No recipes found. Try adjusting your search.");
        return Ok(());
    }
    for recipe in results {
        println!();
        println!("{}", format_card(recipe));
    }
    Ok(())
}

pub async fn toc(config: &Config) -> Result<()> {
    let catalog = load_catalog(config).await?;
    if !catalog.is_loaded() {
        eprintln!("Recipes could not be loaded.");
        return Ok(());
    }

    println!("All Recipes ({})", catalog.len());
    for section in table_of_contents(catalog.recipes()) {
        let noun = if section.count == 1 { "item" } else { "items" };
        println!("{} [{}] - {} {}", section.section_name, section.section, section.count, noun);
        for protein in section.proteins {
            println!("    {:<24} {}", protein.protein_name, protein.count);
        }
    }
    Ok(())
}

pub async fn show(config: &Config, args: &ShowArgs) -> Result<()> {
    let catalog = load_catalog(config).await?;
    let Some(recipe) = catalog.find(&args.id) else {
        bail!("No recipe with id {:?}", args.id);
    };

    println!("{}", recipe.title);
    if let Some(badge) = recipe.display_badge() {
        println!("{}", badge);
    }
    println!();
    println!("Section:     {}", recipe.section_name);
    if let Some(protein) = recipe.protein_display() {
        println!("Protein:     {}", protein);
    }
    if !recipe.cooking_methods.is_empty() {
        println!("Methods:     {}", recipe.cooking_methods.join(", "));
    }
    if let Some(temp) = recipe.temperature_display() {
        println!("Temperature: {}", temp);
    }
    if let Some(time) = recipe.time_display() {
        println!("Time:        {}", time);
    }
    println!();
    println!("{}", recipe.plain_text().trim());
    Ok(())
}
