use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;
use shopdesk_client::presence::PresenceChannel;
use shopdesk_client::{
    ApiGateway, IdleWatchdog, ReqwestTransport, SessionLifecycle, WsPresenceTransport,
};
use shopdesk_core::config::InputKind;
use shopdesk_core::route::{RouteGuard, RouteTable, Router};
use shopdesk_core::session::SessionFile;
use shopdesk_core::{ClientConfig, ClientContext, NotificationBus, PageParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log in as this user unless a saved session is restored
    #[arg(long, short, env = "SHOPDESK_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "SHOPDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Go { path: String, params: Option<PageParams> },
    Send(String),
    Who,
    Logout,
    Quit,
    Empty,
}

impl ReplCommand {
    fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        Ok(match word {
            "" => Self::Empty,
            "go" => {
                let mut parts = rest.split_whitespace();
                let Some(path) = parts.next() else {
                    bail!("usage: go <path> [key=value ...]");
                };
                let params = parse_params(parts)?;
                Self::Go {
                    path: path.to_string(),
                    params,
                }
            }
            "send" if !rest.is_empty() => Self::Send(rest.to_string()),
            "send" => bail!("usage: send <text>"),
            "who" => Self::Who,
            "logout" => Self::Logout,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}' (go, send, who, logout, quit)"),
        })
    }
}

/// `key=value` pairs; values that parse as JSON keep their type.
fn parse_params<'a>(pairs: impl Iterator<Item = &'a str>) -> Result<Option<PageParams>> {
    let mut params = PageParams::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{pair}'"))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok((!params.is_empty()).then_some(params))
}

pub async fn run(config: ClientConfig, args: RunArgs) -> Result<()> {
    let ctx = ClientContext::new();
    ctx.notifier.set_max_count(config.notify.max_count);

    let guard = RouteGuard::new(
        Arc::new(RouteTable::default()),
        ctx.session.clone(),
        ctx.ui.clone(),
        config.router.guard_poll(),
    );
    let router = Router::new(guard, ctx.ui.clone());

    let transport = Arc::new(ReqwestTransport::new(
        config.api_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ));
    let gateway = ApiGateway::new(transport, ctx.clone(), Arc::new(router.clone()));
    let presence = PresenceChannel::new(
        Arc::new(WsPresenceTransport::default()),
        &config.ws_url,
        config.presence.clone(),
    )?;
    let watchdog = IdleWatchdog::new(gateway.clone(), config.idle.clone());
    let session_file = SessionFile::new(config.session_file_path()?);
    let lifecycle = SessionLifecycle::new(gateway, presence, watchdog, Some(session_file));

    let printer = tokio::spawn(print_notifications(
        ctx.notifier.clone(),
        Duration::from_secs(config.notify.display_secs),
    ));

    lifecycle.start();
    let restored = lifecycle.bootstrap().await;
    if !restored {
        if let Some(username) = &args.username {
            let password = args
                .password
                .as_deref()
                .context("--password or SHOPDESK_PASSWORD is required with --username")?;
            // Failures are already reported as notifications
            let _ = lifecycle.login(username, password).await;
        }
    }

    let start = if ctx.session.is_authenticated() { "/games" } else { "/" };
    let landed = router.push(start).await?;
    println!("at {landed}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        lifecycle.record_input(InputKind::PointerDown);

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Go { path, params } => match router.go_page(&path, params).await {
                Ok(landed) => println!("at {landed}"),
                Err(e) => eprintln!("{e}"),
            },
            ReplCommand::Send(text) => {
                if !lifecycle.presence().send(text) {
                    eprintln!("presence is not connected");
                }
            }
            ReplCommand::Who => {
                let users = lifecycle.presence().online_users();
                println!(
                    "{:?}: {}",
                    lifecycle.presence().state(),
                    if users.is_empty() {
                        "-".to_string()
                    } else {
                        users.join(", ")
                    }
                );
            }
            ReplCommand::Logout => {
                // Failures are already reported as notifications
                let _ = lifecycle.logout().await;
            }
            ReplCommand::Quit => break,
        }
    }

    lifecycle.shutdown();
    printer.abort();
    Ok(())
}

async fn print_notifications(bus: NotificationBus, display: Duration) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(notification) => {
                println!(
                    "[{}] {}",
                    notification.status,
                    notification.messages.join(" / ")
                );
                bus.dismiss_after(notification.id, display);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "[Notify] Printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_go_with_params() {
        let command = ReplCommand::parse("go /members/edit id=7 tab=phones").unwrap();
        let ReplCommand::Go { path, params } = command else {
            panic!("expected go");
        };
        assert_eq!(path, "/members/edit");

        let params = params.unwrap();
        assert_eq!(params["id"], json!(7));
        assert_eq!(params["tab"], json!("phones"));
    }

    #[test]
    fn test_parse_go_without_params() {
        assert_eq!(
            ReplCommand::parse("go /games").unwrap(),
            ReplCommand::Go {
                path: "/games".to_string(),
                params: None
            }
        );
        assert!(ReplCommand::parse("go").is_err());
        assert!(ReplCommand::parse("go /games id").is_err());
    }

    #[test]
    fn test_parse_send_keeps_text() {
        assert_eq!(
            ReplCommand::parse("send  hello there ").unwrap(),
            ReplCommand::Send("hello there".to_string())
        );
        assert!(ReplCommand::parse("send").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ReplCommand::parse("who").unwrap(), ReplCommand::Who);
        assert_eq!(ReplCommand::parse("logout").unwrap(), ReplCommand::Logout);
        assert_eq!(ReplCommand::parse("quit").unwrap(), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("   ").unwrap(), ReplCommand::Empty);
        assert!(ReplCommand::parse("dance").is_err());
    }
}
