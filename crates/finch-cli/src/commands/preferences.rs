//! Preference commands

use std::collections::HashMap;

use anyhow::{Context, Result};
use finch_core::models::{NotificationCategory, PreferencesUpdate};
use finch_core::NotificationEngine;

/// Raw `finch prefs set` arguments
#[derive(Debug, Default)]
pub struct PrefsArgs {
    pub enabled: Option<bool>,
    pub quiet_hours: Option<String>,
    pub no_quiet_hours: bool,
    pub timezone_offset: Option<i32>,
    pub max_per_hour: Option<u32>,
    pub max_per_day: Option<u32>,
    pub high_value_threshold: Option<f64>,
    pub disable: Vec<String>,
    pub enable: Vec<String>,
}

/// Parse "22-7" into (22, 7)
pub fn parse_quiet_hours(value: &str) -> Result<(u32, u32)> {
    let (start, end) = value
        .split_once('-')
        .with_context(|| format!("Quiet hours must look like 22-7, got '{}'", value))?;
    let start: u32 = start
        .trim()
        .parse()
        .with_context(|| format!("Invalid start hour: {}", start))?;
    let end: u32 = end
        .trim()
        .parse()
        .with_context(|| format!("Invalid end hour: {}", end))?;
    Ok((start, end))
}

pub fn build_prefs_update(args: PrefsArgs) -> Result<PreferencesUpdate> {
    let mut update = PreferencesUpdate {
        notifications_enabled: args.enabled,
        timezone_offset_minutes: args.timezone_offset,
        max_notifications_per_hour: args.max_per_hour,
        max_notifications_per_day: args.max_per_day,
        high_value_threshold: args.high_value_threshold,
        ..Default::default()
    };

    if let Some(window) = args.quiet_hours.as_deref() {
        let (start, end) = parse_quiet_hours(window)?;
        update.quiet_hours_enabled = Some(true);
        update.quiet_hours_start = Some(start);
        update.quiet_hours_end = Some(end);
    } else if args.no_quiet_hours {
        update.quiet_hours_enabled = Some(false);
    }

    let mut categories = HashMap::new();
    for (names, enabled) in [(&args.disable, false), (&args.enable, true)] {
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let category: NotificationCategory =
                name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            categories.insert(category, enabled);
        }
    }
    if !categories.is_empty() {
        update.category_preferences = Some(categories);
    }

    Ok(update)
}

pub fn cmd_prefs_show(engine: &NotificationEngine, user: &str) -> Result<()> {
    let prefs = engine.preferences(user)?;

    println!();
    println!("⚙️  Preferences for {}", user);
    println!("   ─────────────────────────────");
    println!(
        "   Notifications:   {}",
        if prefs.notifications_enabled { "on" } else { "off" }
    );
    if prefs.quiet_hours_enabled {
        println!(
            "   Quiet hours:     {:02}:00 - {:02}:00",
            prefs.quiet_hours_start, prefs.quiet_hours_end
        );
    } else {
        println!("   Quiet hours:     off");
    }
    println!("   UTC offset:      {} min", prefs.timezone_offset_minutes);
    println!(
        "   Rate limits:     {}/hour, {}/day",
        prefs.max_notifications_per_hour, prefs.max_notifications_per_day
    );
    println!("   High value:      {:.2}", prefs.high_value_threshold);

    let mut disabled: Vec<String> = prefs
        .category_preferences
        .iter()
        .filter(|(_, enabled)| !**enabled)
        .map(|(c, _)| c.to_string())
        .collect();
    disabled.sort();
    if !disabled.is_empty() {
        println!("   Muted:           {}", disabled.join(", "));
    }
    println!();
    Ok(())
}

pub fn cmd_prefs_set(engine: &NotificationEngine, user: &str, update: PreferencesUpdate) -> Result<()> {
    engine.update_preferences(user, update)?;
    println!("✅ Preferences updated");
    cmd_prefs_show(engine, user)
}
