use std::time::Duration;

use {
    secrecy::ExposeSecret,
    tandem_config::{RelayRule, TandemConfig},
    tandem_discord::DiscordConfig,
    tandem_irc::{BridgeConfig, IrcBridgeBuilder},
};

/// Turn the file config into a validated [`BridgeConfig`].
pub fn bridge_config(config: &TandemConfig) -> anyhow::Result<BridgeConfig> {
    let irc = &config.irc;
    let discord = DiscordConfig {
        proxy: config.discord.proxy.clone(),
        ..DiscordConfig::default()
    };

    let mut builder = IrcBridgeBuilder::new()
        .host(irc.host.as_str())
        .nick(irc.nick.as_str())
        .tls(irc.tls)
        .split_len(irc.split_len)
        .quit_message(irc.quit_message.as_str())
        .reconnect_backoff(Duration::from_secs(irc.reconnect_secs))
        .discord(discord)
        .token(config.token());
    if let Some(password) = &irc.password {
        builder = builder.password(password.expose_secret().as_str());
    }

    for rule in config.relay_rules()? {
        builder = match rule {
            RelayRule::Relay { from, to } => builder.relay(from, to),
            RelayRule::Sync { irc, discord } => builder.sync(irc, discord),
        };
    }
    Ok(builder.build()?)
}
