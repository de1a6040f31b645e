use chrono::Local;

/// Where a report comes from: the configured store/location label and the
/// machine name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub identity: String,
    pub machine: String,
}

impl Origin {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            machine: machine_name(),
        }
    }
}

pub fn machine_name() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Chat reports. Rendered as Telegram HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    RemoteAccess {
        origin: Origin,
        tool_id: Option<String>,
        /// Only present when the credential may actually be in effect.
        credential: Option<String>,
        state: String,
    },
    Rdp {
        origin: Origin,
        endpoint: String,
    },
    Update {
        origin: Origin,
        summary: String,
    },
    Error {
        origin: Origin,
        detail: String,
    },
}

impl Report {
    pub fn render_html(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        match self {
            Self::RemoteAccess {
                origin,
                tool_id,
                credential,
                state,
            } => {
                let mut text = format!(
                    "<b>Remote access request</b>\n\n{}\n\n<b>ID:</b> <code>{}</code>\n",
                    origin_lines(origin),
                    escape_html(tool_id.as_deref().unwrap_or("unknown")),
                );
                if let Some(credential) = credential {
                    text.push_str(&format!(
                        "<b>Password:</b> <code>{}</code>\n",
                        escape_html(credential)
                    ));
                }
                text.push_str(&format!("<b>Password state:</b> {}", escape_html(state)));
                text
            }
            Self::Rdp { origin, endpoint } => format!(
                "<b>RDP session</b>\n\n{}\n<b>Time:</b> {now}\n\n<b>Endpoint:</b> <code>{}</code>",
                origin_lines(origin),
                escape_html(endpoint),
            ),
            Self::Update { origin, summary } => format!(
                "<b>Self-update</b>\n\n{}\n<b>Time:</b> {now}\n\n{}",
                origin_lines(origin),
                escape_html(summary),
            ),
            Self::Error { origin, detail } => format!(
                "<b>Error</b>\n\n{}\n<b>Time:</b> {now}\n\n<b>Details:</b>\n<code>{}</code>",
                origin_lines(origin),
                escape_html(detail),
            ),
        }
    }
}

fn origin_lines(origin: &Origin) -> String {
    format!(
        "<b>Store / location:</b> {}\n<b>PC:</b> <code>{}</code>",
        escape_html(&origin.identity),
        escape_html(&origin.machine),
    )
}

/// Escapes the three characters Telegram's HTML parse mode treats specially.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn origin() -> Origin {
        Origin {
            identity: "12 / Dialog & Till".to_string(),
            machine: "POS-<1>".to_string(),
        }
    }

    #[test]
    fn escapes_user_supplied_text() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
    }

    #[test]
    fn remote_access_report_includes_id_and_state() {
        let text = Report::RemoteAccess {
            origin: origin(),
            tool_id: Some("123 456 789".to_string()),
            credential: Some("Ab3dEf".to_string()),
            state: "unconfirmed".to_string(),
        }
        .render_html();

        assert!(text.contains("12 / Dialog &amp; Till"));
        assert!(text.contains("<code>POS-&lt;1&gt;</code>"));
        assert!(text.contains("<code>123 456 789</code>"));
        assert!(text.contains("<code>Ab3dEf</code>"));
        assert!(text.ends_with("<b>Password state:</b> unconfirmed"));
    }

    #[test]
    fn failed_credential_is_not_reported() {
        let text = Report::RemoteAccess {
            origin: origin(),
            tool_id: None,
            credential: None,
            state: "failed".to_string(),
        }
        .render_html();

        assert!(!text.contains("<b>Password:</b>"));
        assert!(text.contains("<code>unknown</code>"));
    }
}
