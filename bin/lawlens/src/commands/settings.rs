use lawlens_agent::render_style;
use lawlens_core::Paths;
use lawlens_storage::SettingsStore;

use super::open_store;

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

pub async fn show(paths: &Paths, domain: &str) -> anyhow::Result<()> {
    let store = open_store(paths).await?;
    let settings = SettingsStore::new(store).load(domain).await;

    println!("Settings for {}", domain);
    println!("  font size:    {}px", settings.font_size);
    println!("  line height:  {:.1}", settings.line_height);
    println!("  margins:      {}px / {}px", settings.left_margin, settings.right_margin);
    println!("  sidebar:      {}", if settings.sidebar_hidden { "hidden" } else { "shown" });
    println!("  focus mode:   {}", on_off(settings.focus_mode));
    println!("  keep-alive:   {}", on_off(settings.keep_alive));
    println!("  killswitch:   {}", on_off(settings.killswitch));
    if !settings.killswitch {
        println!();
        println!("  style: {}", render_style(&settings));
    }
    Ok(())
}

pub async fn reset(paths: &Paths, domain: &str) -> anyhow::Result<()> {
    let store = open_store(paths).await?;
    SettingsStore::new(store).reset(domain).await?;
    println!("✓ Settings for {} reset to defaults", domain);
    Ok(())
}
