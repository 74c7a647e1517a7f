//! Profiles command - manages saved connection profiles.

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;
use xmla_config::{
    PropertyMap, load_profiles, parse_connect_string, save_profiles_to, to_connect_string,
    xdg_config_path,
};

use super::Context;

/// Arguments for the profiles command.
#[derive(Args, Debug)]
pub struct ProfilesArgs {
    #[command(subcommand)]
    pub command: ProfilesCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
    /// List saved profiles
    List,

    /// Show one profile as a connect string
    Show {
        /// Profile name (default profile when omitted)
        name: Option<String>,
    },

    /// Save a profile from a connect string
    Set {
        /// Profile name
        name: String,

        /// Connect string (jdbc:xmla:Server=...;Catalog=...)
        connect_string: String,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Delete a profile
    Remove {
        /// Profile name
        name: String,
    },

    /// Print the profile file location
    Path,
}

#[derive(Debug, Serialize)]
struct ProfileEntry<'a> {
    name: &'a str,
    default: bool,
    connect_string: String,
}

/// Run the profiles command.
pub async fn run(args: ProfilesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ProfilesCommand::List => cmd_list(ctx),
        ProfilesCommand::Show { name } => cmd_show(name.as_deref(), ctx),
        ProfilesCommand::Set {
            name,
            connect_string,
            default,
        } => cmd_set(name, &connect_string, default, ctx),
        ProfilesCommand::Remove { name } => cmd_remove(&name, ctx),
        ProfilesCommand::Path => cmd_path(ctx),
    }
}

fn cmd_list(ctx: &Context) -> Result<()> {
    let profiles = load_profiles().context("failed to load profiles")?;
    let entries: Vec<ProfileEntry<'_>> = profiles
        .profiles
        .iter()
        .map(|(name, props)| ProfileEntry {
            name,
            default: profiles.default_profile.as_deref() == Some(name.as_str()),
            connect_string: to_connect_string(&masked(props)),
        })
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if entries.is_empty() {
        println!("{}", dim.apply_to("No profiles saved."));
        return Ok(());
    }

    println!("{}", style("Profiles").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for entry in &entries {
        let marker = if entry.default { "*" } else { " " };
        println!(
            "{} {} {}",
            Style::new().green().apply_to(marker),
            Style::new().cyan().apply_to(entry.name),
            dim.apply_to(&entry.connect_string)
        );
    }
    Ok(())
}

fn cmd_show(name: Option<&str>, ctx: &Context) -> Result<()> {
    let profiles = load_profiles().context("failed to load profiles")?;
    let props = profiles.resolve(name)?;
    let connect_string = to_connect_string(&masked(props));

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&masked(props))?);
    } else {
        println!("{connect_string}");
    }
    Ok(())
}

fn cmd_set(name: String, connect_string: &str, default: bool, ctx: &Context) -> Result<()> {
    if name.trim().is_empty() {
        bail!("profile name is empty");
    }
    let props = parse_connect_string(connect_string).context("invalid connect string")?;
    let path = profile_path()?;

    let mut profiles = load_profiles().context("failed to load profiles")?;
    profiles.set_profile(name.clone(), props);
    if default || profiles.default_profile.is_none() {
        profiles.default_profile = Some(name.clone());
    }
    save_profiles_to(&profiles, &path)?;

    if !ctx.json_output {
        println!(
            "{} Saved profile {}",
            Style::new().green().apply_to("✓"),
            style(&name).bold()
        );
    }
    Ok(())
}

fn cmd_remove(name: &str, ctx: &Context) -> Result<()> {
    let path = profile_path()?;
    let mut profiles = load_profiles().context("failed to load profiles")?;
    if profiles.remove_profile(name).is_none() {
        bail!("profile not found: {name}");
    }
    save_profiles_to(&profiles, &path)?;

    if !ctx.json_output {
        println!("{} Removed profile {}", Style::new().green().apply_to("✓"), name);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = profile_path()?;
    if ctx.json_output {
        println!("{}", serde_json::json!({ "path": path }));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn profile_path() -> Result<std::path::PathBuf> {
    xdg_config_path().ok_or_else(|| anyhow!("cannot determine the config directory"))
}

fn masked(props: &PropertyMap) -> PropertyMap {
    props
        .iter()
        .map(|(k, v)| {
            let v = if k.eq_ignore_ascii_case("password") {
                "********".to_string()
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect()
}
