// src/probe/vpn.rs
//! Exit VPN items, read from the stock OpenVPN configuration.
//!
//! `/etc/default/openvpn` names the tunnel that is started (`AUTOSTART=`),
//! which is also the provider. A configured but unused OpenVPN says `none`.

use serde_json::Value;

use super::{ProbeContext, ProbeError, ProbeFuture, read_file};

/// Reported when the tunnel config carries no `## ExitCountry` comment.
pub const UNKNOWN_COUNTRY: &str = "??";

pub fn exitvpn_provider(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move { provider(ctx).await.map(Value::String) })
}

/// ISO 3166 code of the exit country.
pub fn exitvpn_country(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let provider = provider(ctx).await?;
        let path = ctx
            .paths
            .openvpn_dir
            .join(format!("{}.conf", provider.to_lowercase()));
        let text = read_file(&path).await?;
        Ok(Value::String(
            parse_exit_country(&text).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        ))
    })
}

async fn provider(ctx: &ProbeContext) -> Result<String, ProbeError> {
    let text = read_file(&ctx.paths.openvpn_default).await?;
    parse_autostart(&text).ok_or_else(|| ProbeError::missing("AUTOSTART in openvpn defaults"))
}

/// Value of the first `AUTOSTART=` line, quotes removed.
pub fn parse_autostart(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("AUTOSTART="))
        .map(|value| value.trim().trim_matches('"').to_string())
}

/// Value of a `## ExitCountry = XX` comment.
pub fn parse_exit_country(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("## ExitCountry = "))
        .map(|value| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use serde_json::json;

    #[test]
    fn test_parse_autostart() {
        let text = "# Start only these VPNs automatically\n#AUTOSTART=\"all\"\nAUTOSTART=\"Mullvad\"\n";
        assert_eq!(parse_autostart(text).as_deref(), Some("Mullvad"));
        assert_eq!(parse_autostart("AUTOSTART=none\n").as_deref(), Some("none"));
        assert_eq!(parse_autostart("# nothing\n"), None);
    }

    #[test]
    fn test_parse_exit_country() {
        let text = "client\n## ExitCountry = SE\ndev tun\n";
        assert_eq!(parse_exit_country(text).as_deref(), Some("SE"));
        assert_eq!(parse_exit_country("client\n"), None);
    }

    fn context(dir: &std::path::Path) -> ProbeContext {
        let mut config = AgentConfig::default();
        config.paths.openvpn_default = dir.join("openvpn");
        config.paths.openvpn_dir = dir.to_path_buf();
        ProbeContext::from_config(&config)
    }

    #[tokio::test]
    async fn test_country_follows_provider() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("openvpn"), "AUTOSTART=\"Mullvad\"\n").unwrap();
        std::fs::write(dir.path().join("mullvad.conf"), "## ExitCountry = NL\n").unwrap();
        let ctx = context(dir.path());

        assert_eq!(exitvpn_provider(&ctx).await.unwrap(), json!("Mullvad"));
        assert_eq!(exitvpn_country(&ctx).await.unwrap(), json!("NL"));
    }

    #[tokio::test]
    async fn test_country_unknown_without_comment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("openvpn"), "AUTOSTART=\"ovpn\"\n").unwrap();
        std::fs::write(dir.path().join("ovpn.conf"), "client\n").unwrap();
        let ctx = context(dir.path());

        assert_eq!(exitvpn_country(&ctx).await.unwrap(), json!("??"));
    }

    #[tokio::test]
    async fn test_missing_openvpn_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        assert!(matches!(
            exitvpn_provider(&ctx).await,
            Err(ProbeError::Io { .. })
        ));
        assert!(exitvpn_country(&ctx).await.is_err());
    }
}
