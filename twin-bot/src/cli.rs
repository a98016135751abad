use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::github::GraphqlClient;
use crate::load_config::load_config;
use crate::template::{fetch_template, render, EntryLinks, PluginIdentity};
use twin_bot_core::pipeline::{submit, Section, SubmissionRequest};

/// CLI for twin-bot: submit plugin entries to This Week in Neovim.
#[derive(Parser)]
#[clap(
    name = "twin-bot",
    version,
    about = "Open a pull request adding a plugin entry to this week's This Week in Neovim"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit one entry to this week's digest
    Submit {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Section number: 3 for a new plugin, 4 for a plugin update
        #[clap(long)]
        section: u32,
        /// GitHub URL of the plugin
        #[clap(long)]
        repo: String,
        /// Link to the reddit announcement, if any
        #[clap(long)]
        reddit: Option<String>,
        /// Use this file as the entry instead of rendering the section template
        #[clap(long)]
        contents: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Submit {
            config,
            section,
            repo,
            reddit,
            contents,
        } => {
            let plugin = PluginIdentity::from_repository_url(&repo)?;
            let section_kind = Section::try_from(section)?;
            let config = load_config(config)?;

            let file_contents = match contents {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read entry contents {path:?}"))?,
                None => {
                    let http = reqwest::Client::builder()
                        .user_agent(config.github.user_agent.as_str())
                        .build()
                        .context("Failed to build HTTP client")?;
                    let template =
                        fetch_template(&http, &config.template.base_url, section_kind).await?;
                    let links = EntryLinks {
                        repository: &repo,
                        reddit: reddit.as_deref(),
                    };
                    render(&template, section_kind, &plugin, &links)
                }
            };

            let client = GraphqlClient::new(
                &config.github,
                &config.submit.upstream_owner,
                &config.submit.repository,
            )
            .context("Failed to construct GraphQL client")?;

            let request = SubmissionRequest {
                section_index: section,
                plugin_name: plugin.name.clone(),
                file_contents,
            };

            println!("Submitting {} to section {section}...", plugin.name);
            match submit(&client, &config.submit, &request).await {
                Ok(result) => {
                    println!("Submission complete.");
                    println!("Pull request: {}", result.pull_request_url);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = ?e, retryable = e.is_retryable(), "Submission failed");
                    Err(anyhow::Error::new(e).context("Submission failed"))
                }
            }
        }
    }
}
