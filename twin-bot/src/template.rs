//! Entry generation from the upstream section templates.
//!
//! Each section directory upstream carries a `1-example.md` showing the expected entry. The bot
//! fetches it and swaps in the plugin's name, author credit and links.

use anyhow::{Context, Result};
use regex::Regex;
use twin_bot_core::pipeline::Section;

/// Author and name of a plugin, taken from its GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub author: String,
    pub name: String,
}

impl PluginIdentity {
    /// `https://github.com/author/plugin.nvim(.git)` → author `author`, name `plugin.nvim`.
    pub fn from_repository_url(url: &str) -> Result<Self> {
        let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [.., author, name] if !author.ends_with(':') => {
                let name: &str = name;
                let name = name.strip_suffix(".git").unwrap_or(name);
                if name.is_empty() {
                    anyhow::bail!("repository URL '{url}' has no plugin name");
                }
                Ok(PluginIdentity {
                    author: author.to_string(),
                    name: name.to_string(),
                })
            }
            _ => anyhow::bail!("repository URL '{url}' is not <host>/<author>/<plugin>"),
        }
    }
}

/// Links placed into a rendered entry.
#[derive(Debug, Clone, Default)]
pub struct EntryLinks<'a> {
    pub repository: &'a str,
    pub reddit: Option<&'a str>,
}

/// Download the example entry of `section`.
pub async fn fetch_template(
    client: &reqwest::Client,
    base_url: &str,
    section: Section,
) -> Result<String> {
    let url = format!(
        "{}/{}/1-example.md",
        base_url.trim_end_matches('/'),
        section.subdirectory()
    );
    tracing::info!(url = %url, "Fetching section template");
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch template {url}"))?
        .error_for_status()
        .with_context(|| format!("Template {url} returned an error status"))?;
    response
        .text()
        .await
        .with_context(|| format!("Failed to read template {url}"))
}

fn placeholder(section: Section) -> &'static str {
    match section {
        Section::NewPlugin => "new-your-plugin",
        Section::PluginUpdate => "update-your-plugin",
    }
}

/// Fill `template` with the plugin's identity and links.
pub fn render(
    template: &str,
    section: Section,
    plugin: &PluginIdentity,
    links: &EntryLinks<'_>,
) -> String {
    let target = placeholder(section);
    let name = &plugin.name;

    let mut content = template
        .replace(&format!("\"{target}.nvim\""), &format!("\"{name}\""))
        .replace(&format!("\"#{target}.nvim\""), &format!("\"#{name}\""))
        .replace(
            &format!("<span>{target}.nvim</span>"),
            &format!("<span>{name}</span>"),
        );

    let credit = format!(
        "By [@{author}](https://github.com/{author}).",
        author = plugin.author
    );
    content = match section {
        Section::NewPlugin => replace_line(&content, r"Introduce.*", &credit),
        Section::PluginUpdate => {
            let content =
                replace_line(&content, r"> One-liner description.*", &format!("> {credit}"));
            replace_line(&content, r"Explain what has changed\.", "TODO by plugin author")
        }
    };

    content = content.replace("https://link-to-the-github-project", links.repository);
    if let Some(reddit) = links.reddit {
        content = content.replace("https://link-to-the-reddit-post", reddit);
    }
    content
}

fn replace_line(content: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(content, regex::NoExpand(replacement)).into_owned(),
        Err(e) => {
            tracing::error!(error = ?e, pattern, "Invalid template pattern");
            content.to_string()
        }
    }
}
