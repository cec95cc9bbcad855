//! `kfbridge notify`: send an internal application message.

use anyhow::Result;
use console::style;

use kfbridge_infra::wecom::WeComClient;
use kfbridge_types::config::BridgeConfig;
use kfbridge_types::wecom::AppMessage;

pub async fn notify(config: &BridgeConfig, user: &str, text: &str, markdown: bool, json: bool) -> Result<()> {
    let client = WeComClient::from_config(&config.wechat)?;
    let message = if markdown {
        AppMessage::markdown(user, text)
    } else {
        AppMessage::text(user, text)
    };

    let response = client.send_app_message(&message).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("  {} Message sent to '{}'", style("✓").green().bold(), style(user).bold());
        if let Some(invalid) = response.invaliduser.filter(|u| !u.is_empty()) {
            println!("  {} Invalid recipients: {}", style("!").yellow().bold(), invalid);
        }
    }
    Ok(())
}
