use anyhow::Result;
use console::style;
use dialoguer::Input;

use ragstudio::config::Config;

pub async fn run(mut cfg: Config, server: Option<&str>, project: Option<&str>, namespace: Option<&str>) -> Result<()> {
    println!();
    println!("  {}", style("ragstudio").bold().cyan());
    println!("  {}", style("RAG configuration from the terminal").dim());
    println!();

    let data_dir = Config::data_dir()?;
    println!("  {} Data directory: {}", style("✓").green(), style(data_dir.display()).dim());

    if let Some(server) = server {
        cfg.server_url = server.trim_end_matches('/').to_string();
    }
    if let Some(namespace) = namespace {
        cfg.namespace = namespace.to_string();
    }
    match project {
        Some(project) => cfg.project = Some(project.to_string()),
        None if cfg.project.is_none() && super::interactive() => {
            let project: String = Input::new()
                .with_prompt("Default project")
                .allow_empty(true)
                .interact_text()?;
            if !project.trim().is_empty() {
                cfg.project = Some(project.trim().to_string());
            }
        }
        None => {}
    }

    if cfg.ensure_client_secret() {
        println!("  {} Client secret generated", style("✓").green());
        println!(
            "  {} Keep {} safe: stored API keys cannot be decrypted without it",
            style("ℹ").blue(),
            style(Config::config_path()?.display()).dim()
        );
    } else {
        println!("  {} Client secret present", style("✓").green());
    }

    cfg.save()?;
    println!("  {} Config saved", style("✓").green());
    println!();
    println!("  Server:    {}", cfg.server_url);
    println!("  Namespace: {}", cfg.namespace);
    println!("  Project:   {}", cfg.project.as_deref().unwrap_or("(none, pass --project)"));
    println!();
    Ok(())
}
