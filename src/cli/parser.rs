use anyhow::{Context as _, Result};
use console::style;
use serde_json::{Map, Value};
use std::path::Path;

use ragstudio::parser_settings::{Control, ParserSchema, ParserSettingsForm};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn describe(control: &Control) -> String {
    match control {
        Control::Toggle(on) => format!("[{}]", if *on { "x" } else { " " }),
        Control::Select { options, value } => {
            format!("{} ({})", value.as_deref().unwrap_or("-"), options.join(" | "))
        }
        Control::Numeric(input) => {
            let bounds = match (input.minimum, input.maximum) {
                (Some(min), Some(max)) => format!(" [{min}..{max}]"),
                (Some(min), None) => format!(" [>= {min}]"),
                (None, Some(max)) => format!(" [<= {max}]"),
                (None, None) => String::new(),
            };
            format!("{}{bounds}", if input.text.is_empty() { "-" } else { &input.text })
        }
        Control::List { text, .. } => format!("[{text}]"),
        Control::Text { value, .. } => value.clone(),
    }
}

pub fn render(schema_path: &Path, current: Option<&Path>, edits: &[String]) -> Result<()> {
    let schema: ParserSchema = read_json(schema_path)?;
    let current: Map<String, Value> = current.map(read_json::<Map<String, Value>>).transpose()?.unwrap_or_default();
    let mut form = ParserSettingsForm::new(&schema, &current);

    if let Some(title) = &schema.title {
        println!("{}", style(title).bold());
    }
    for (key, control) in form.controls() {
        let hint = schema
            .property(key)
            .and_then(|p| p.description.as_deref())
            .map(|d| format!("  {}", style(d).dim()))
            .unwrap_or_default();
        println!("  {key:<24} {}{hint}", describe(control));
    }

    if edits.is_empty() {
        return Ok(());
    }

    for edit in edits {
        let (key, text) = edit
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{edit}'"))?;
        if let Err(e) = form.input(key.trim(), text) {
            eprintln!("  {} {}", style("✗").red().bold(), e.message);
            continue;
        }
        for flagged in form.flagged() {
            println!("  {} {flagged} is out of range and will be clamped", style("⚠").yellow());
        }
    }
    form.blur();

    println!();
    println!("{}", serde_json::to_string_pretty(&Value::Object(form.values()))?);
    Ok(())
}
