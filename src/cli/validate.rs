use std::path::Path;
use console::style;

use crate::config;
use crate::errors::AltscoutError;
use crate::pipeline::compose::NotificationTemplate;

pub async fn handle_validate(config_path: &str) -> Result<(), AltscoutError> {
    let config = config::load_config(Path::new(config_path)).await?;
    println!("{} Configuration is valid: {}", style("✓").green(), config_path);
    println!("  server        {} (space {})", config.wiki.server, config.wiki.space);
    println!("  coordinators  {}", config.coordinators.len());
    let template = NotificationTemplate::load(config.notify.template_path.as_deref())?;
    for content_id in template.unresolved_content_ids(&config.notify.inline_assets) {
        println!(
            "  {}",
            style(format!("template image cid:{} has no notify.inline_assets entry", content_id)).yellow()
        );
    }
    if let Some(redirect) = &config.notify.redirect_to {
        println!("  {}", style(format!("all mail redirected to {}", redirect)).yellow());
    }
    Ok(())
}
