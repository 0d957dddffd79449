use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::ProgressBar;

mod cli;
mod collaborators;
mod config;
mod records;
mod retrieval;
#[cfg(test)]
mod tests;

use collaborators::HttpTranslator;
use config::Config;
use retrieval::{PatentDetail, QueryResult, SearchService};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = cli::Args::parse();

    let base_path = base_path()?;
    std::fs::create_dir_all(&base_path)
        .context("Failed to create application base directory")?;

    let config = Config::load_with(&base_path);
    let service = build_service(config.clone(), &base_path)?;

    match args.command {
        cli::Command::Index { rebuild } => {
            if rebuild {
                service.invalidate_cache()?;
            }

            let spinner = ProgressBar::new_spinner();
            spinner.set_message("building corpus index");
            spinner.enable_steady_tick(Duration::from_millis(120));
            let result = service.initialize();
            spinner.finish_and_clear();
            result?;

            println!("{} patents indexed", service.indexed_count());
            Ok(())
        }

        cli::Command::Search { query, top_k, json } => {
            let k = top_k.unwrap_or(config.default_top_k);
            let results = service.search(&query, k)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            if results.is_empty() {
                println!("no matching patents");
                return Ok(());
            }

            for result in &results {
                print_result_card(result);
            }
            Ok(())
        }

        cli::Command::Show {
            publication_number,
            translate,
            json,
        } => {
            let detail = service.detail(&publication_number, translate)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }

            print_detail(&detail);
            Ok(())
        }
    }
}

fn build_service(config: Config, base_path: &str) -> anyhow::Result<SearchService> {
    let mut service = SearchService::new(config.clone(), PathBuf::from(base_path));

    if config.translation.enabled {
        let translator = HttpTranslator::new(
            &config.translation.endpoint,
            &config.translation.target_lang,
        )
        .context("Invalid translation configuration")?;
        service = service.with_translator(Box::new(translator));
    }

    Ok(service)
}

/// Get the base path for the application
fn base_path() -> anyhow::Result<String> {
    let base_path = std::env::var("PATSEEK_BASE_PATH").unwrap_or_else(|_| {
        let home = homedir::my_home()
            .expect("Could not determine home directory")
            .expect("Home directory path is empty");
        format!("{}/.local/share/patseek", home.to_string_lossy())
    });

    Ok(base_path)
}

fn print_result_card(result: &QueryResult) {
    println!(
        "{:>2}. {:.4}  {}  {}",
        result.rank, result.score, result.record.publication_number, result.record.title
    );

    let meta: Vec<&str> = [
        result.record.assignee.as_deref(),
        result.record.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !meta.is_empty() {
        println!("    {}", meta.join(", "));
    }
}

fn print_detail(detail: &PatentDetail) {
    println!("{}", detail.record.title);
    if detail.record.has_identifier() {
        println!("Publication Number: {}", detail.record.publication_number);
    }

    if let Some(assignee) = &detail.record.assignee {
        println!("Assignee: {}", assignee);
    }
    if let Some(country) = &detail.record.country {
        println!("Country: {}", country);
    }
    if let Some(image_url) = &detail.record.image_url {
        println!("Image: {}", image_url);
    }

    println!();
    match &detail.translated_abstract {
        Some(translated) => println!("{}", translated),
        None => println!("{}", detail.record.abstract_text),
    }
}
