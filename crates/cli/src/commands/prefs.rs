//! `tripclaw prefs`: inspect or set preferences field by field.

use std::collections::BTreeSet;

use clap::Args;
use serde::de::DeserializeOwned;
use tripclaw_core::preference::{Interest, PreferenceUpdate};

#[derive(Args, Debug)]
pub struct PrefsArgs {
    /// Session to read or update
    #[arg(short, long)]
    pub session: String,

    /// Comma-separated interests (history, nature, food, shopping, family, art)
    #[arg(long, value_delimiter = ',')]
    pub interests: Option<Vec<String>>,

    /// walk, transit, drive or mixed
    #[arg(long)]
    pub travel_mode: Option<String>,

    /// relaxed, moderate or packed
    #[arg(long)]
    pub pace: Option<String>,

    /// economy, comfort or luxury
    #[arg(long)]
    pub budget: Option<String>,

    /// Comma-separated lodging tags, e.g. quiet,value
    #[arg(long, value_delimiter = ',')]
    pub lodging: Option<Vec<String>>,

    /// Print the profile as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a snake_case enum name the way stored profiles spell it.
fn parse_choice<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .map_err(|_| format!("invalid {field} '{raw}'"))
}

impl PrefsArgs {
    fn update(&self) -> Result<PreferenceUpdate, String> {
        let interests = match &self.interests {
            Some(names) => Some(
                names
                    .iter()
                    .map(|n| parse_choice::<Interest>("interest", n))
                    .collect::<Result<BTreeSet<_>, _>>()?,
            ),
            None => None,
        };
        Ok(PreferenceUpdate {
            interests,
            travel_mode: self.travel_mode.as_deref().map(|v| parse_choice("travel mode", v)).transpose()?,
            pace: self.pace.as_deref().map(|v| parse_choice("pace", v)).transpose()?,
            budget: self.budget.as_deref().map(|v| parse_choice("budget", v)).transpose()?,
            lodging_pref: self.lodging.clone(),
            ..Default::default()
        })
    }
}

pub async fn run(args: PrefsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let update = args.update()?;
    let orchestrator = super::orchestrator()?;

    let profile = if update.is_empty() {
        orchestrator.preferences(&args.session).await?
    } else {
        orchestrator.update_preferences(&args.session, update).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("{}", profile.summary());
        println!("  ({:.0}% complete)", profile.completeness() * 100.0);
    }
    Ok(())
}
