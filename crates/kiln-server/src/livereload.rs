//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the websocket endpoint.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path of the client script injected into every HTML page.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Messages pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Refresh stylesheets without reloading the page
    Css {
        /// URL path of the stylesheet that changed
        path: String,
    },

    /// Connection established
    Connected,
}

/// Handle for broadcasting reload messages to every connected client.
///
/// Cheap to clone; the server and the watcher each hold one.
#[derive(Debug, Clone)]
pub struct LiveReload {
    sender: broadcast::Sender<ReloadMessage>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script tag before `</body>`, or append it when there is none.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..idx]);
            out.push_str(&tag);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Client-side live reload script. Connects back to whichever host served the page.
pub fn client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var protocol = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(protocol + location.host + '{}');

  function refreshStyles() {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    Array.prototype.forEach.call(links, function(link) {{
      var url = new URL(link.href, location.href);
      if (url.host !== location.host) return;
      url.searchParams.set('livereload', Date.now());
      link.href = url.toString();
    }});
  }}

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'css':
        refreshStyles();
        break;
    }}
  }};

  ws.onclose = function() {{
    setTimeout(function() {{
      location.reload();
    }}, 1000);
  }};
}})();
"#,
        SOCKET_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = LiveReload::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Reload);

        match rx.try_recv() {
            Ok(ReloadMessage::Reload) => {}
            _ => panic!("Expected Reload message"),
        }
    }

    #[test]
    fn serializes_messages() {
        let msg = ReloadMessage::Css {
            path: "/css/style.css".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(json, r#"{"type":"css","path":"/css/style.css"}"#);
    }

    #[test]
    fn injects_before_closing_body() {
        let html = inject_client("<html><body><h1>Hi</h1></BODY></html>");

        assert_eq!(
            html,
            "<html><body><h1>Hi</h1><script src=\"/__livereload.js\"></script></BODY></html>"
        );
    }

    #[test]
    fn appends_without_body() {
        let html = inject_client("<p>fragment</p>");

        assert!(html.ends_with("<script src=\"/__livereload.js\"></script>"));
    }

    #[test]
    fn script_targets_socket_path() {
        assert!(client_script().contains("/__livereload"));
    }
}
