//! HTML rendering for the two screens.

use std::fmt::Write as _;

use crate::config::Config;
use crate::display::DisplayView;
use crate::submission::FormView;

/// Label for the normal submit action.
pub const SEND_LABEL: &str = "Send Request";
/// Label while a write is in flight.
pub const SENDING_LABEL: &str = "Sending…";
/// Label for the priority submit action.
pub const PRIORITY_LABEL: &str = "🔥 Request & Play NOW";
/// Acknowledgment shown after a successful submit.
pub const SENT_MESSAGE: &str = "Thanks, your request was sent!";
/// Target of the "Request another" and "Got it" actions.
pub const DISMISS_PATH: &str = "/request/dismiss";

const STYLE: &str = r"
body { background: #1a1a2e; color: #e0e0e0; font-family: system-ui, sans-serif; margin: 0; padding: 1.5rem; }
h1 { margin-top: 0; }
.card { background: #16213e; border-radius: 12px; padding: 1.25rem; max-width: 28rem; }
label { display: block; margin-top: .75rem; }
input { width: 100%; padding: .6rem; margin-top: .25rem; box-sizing: border-box; }
.btn-row { display: flex; gap: .5rem; margin-top: 1rem; }
.error { color: #ff6b6b; }
.hint { opacity: .75; }
.request-item { display: flex; gap: .75rem; padding: .5rem 0; border-bottom: 1px solid #2a2a4e; }
.time { font-variant-numeric: tabular-nums; opacity: .7; }
.note { opacity: .8; font-style: italic; }
.modal-overlay { position: fixed; inset: 0; background: rgba(0,0,0,.6); display: flex; align-items: center; justify-content: center; }
.modal { background: #16213e; border-radius: 12px; padding: 1.5rem; text-align: center; }
";

const LIVE_SCRIPT: &str = r"
(function () {
  const list = document.getElementById('requests');
  function localize() {
    list.querySelectorAll('time[datetime]').forEach(function (el) {
      el.textContent = new Date(el.dateTime)
        .toLocaleTimeString([], { hour: '2-digit', minute: '2-digit', hour12: false });
    });
  }
  localize();
  function connect() {
    const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
    const ws = new WebSocket(scheme + location.host + '/dj/live');
    ws.onmessage = function (event) {
      const msg = JSON.parse(event.data);
      if (msg.type === 'snapshot') { list.innerHTML = msg.html; localize(); }
    };
    ws.onclose = function () { setTimeout(connect, 2000); };
  }
  connect();
})();
";

const DIALOG_SCRIPT: &str = r"
(function () {
  const overlay = document.getElementById('priority-dialog');
  if (overlay) {
    overlay.addEventListener('click', function (event) {
      if (event.target === overlay) { overlay.querySelector('form').submit(); }
    });
  }
})();
";

/// Disables both actions once the form is submitted. The clicked action is
/// carried in a hidden field because disabled buttons are not posted.
const SUBMIT_SCRIPT: &str = r"
function (sendingLabel) {
  const form = document.getElementById('request-form');
  if (!form) { return; }
  let sending = false;
  form.addEventListener('submit', function (event) {
    if (sending) { event.preventDefault(); return; }
    sending = true;
    const action = document.createElement('input');
    action.type = 'hidden';
    action.name = 'action';
    action.value = event.submitter && event.submitter.value ? event.submitter.value : 'normal';
    form.appendChild(action);
    form.querySelectorAll('button[name=action]').forEach(function (button) {
      button.removeAttribute('name');
      button.disabled = true;
    });
    const send = form.querySelector('button[value=normal]');
    if (send) { send.textContent = sendingLabel; }
  });
}
";

/// Escape text for use in HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Render the list rows, or the empty placeholder.
#[must_use]
pub fn render_request_list(view: &DisplayView) -> String {
    if let Some(message) = view.empty_message {
        return format!("<p class=\"empty\">{}</p>", escape_html(message));
    }

    let mut html = String::new();
    for row in &view.rows {
        let _ = write!(html, "<div class=\"request-item\" data-id=\"{}\">", escape_html(&row.id));
        match &row.datetime {
            Some(datetime) => {
                let _ = write!(
                    html,
                    "<time class=\"time\" datetime=\"{}\">{}</time>",
                    escape_html(datetime),
                    escape_html(&row.time),
                );
            }
            None => {
                let _ = write!(html, "<span class=\"time\">{}</span>", escape_html(&row.time));
            }
        }
        let _ = write!(html, "<span class=\"song\">{}</span>", escape_html(&row.song));
        if let Some(note) = &row.note {
            let _ = write!(html, "<span class=\"note\">— {}</span>", escape_html(note));
        }
        html.push_str("</div>");
    }
    html
}

/// Render the DJ display page.
#[must_use]
pub fn render_display_page(config: &Config, view: &DisplayView) -> String {
    let body = format!(
        "<main class=\"dj-screen\">\n<h1>{title}</h1>\n<p class=\"hint\">{hint}</p>\n\
         <section class=\"qr-section\">\n<p class=\"subtitle\">Scan to request</p>\n\
         <div class=\"qr-wrapper\">{qr}</div>\n<p class=\"url-hint\">{url}</p>\n</section>\n\
         <section class=\"request-list\">\n<h2>Live Requests</h2>\n<div id=\"requests\">{list}</div>\n</section>\n\
         </main>\n<script>{LIVE_SCRIPT}</script>",
        title = escape_html(&config.board.title),
        hint = escape_html(&config.board.rate_limit_hint),
        qr = view.qr_svg,
        url = escape_html(&view.request_url),
        list = render_request_list(view),
    );
    layout(&config.board.title, &body)
}

/// Render the attendee submission page for form `form_id`.
#[must_use]
pub fn render_request_page(config: &Config, form_id: &str, view: &FormView) -> String {
    let form_id = escape_html(form_id);
    let mut body = format!(
        "<main class=\"request-screen\">\n<div class=\"card\">\n<h1>{title}</h1>\n<p class=\"hint\">{hint}</p>\n",
        title = escape_html(&config.board.title),
        hint = escape_html(&config.board.rate_limit_hint),
    );

    let form_hidden = if view.sent { " hidden" } else { "" };
    if view.sent {
        let _ = write!(
            body,
            "<div id=\"sent\" class=\"success\">\n<p>{SENT_MESSAGE}</p>\n\
             <form method=\"post\" action=\"{DISMISS_PATH}\">\
             <input type=\"hidden\" name=\"form_id\" value=\"{form_id}\">\
             <input type=\"hidden\" name=\"target\" value=\"sent\">\
             <button type=\"submit\">Request another</button></form>\n</div>\n"
        );
    }

    let disabled = if view.sending { " disabled" } else { "" };
    let send_label = if view.sending { SENDING_LABEL } else { SEND_LABEL };
    let _ = write!(
        body,
        "<form id=\"request-form\" method=\"post\" action=\"/request\"{form_hidden}>\n\
         <input type=\"hidden\" name=\"form_id\" value=\"{form_id}\">\n\
         <label for=\"song\">Song + Artist *</label>\n\
         <input id=\"song\" name=\"song\" type=\"text\" placeholder=\"e.g. &quot;Blinding Lights – The Weeknd&quot;\" value=\"{song}\" autofocus>\n\
         <label for=\"note\">Message / Dedication</label>\n\
         <input id=\"note\" name=\"note\" type=\"text\" placeholder=\"Optional\" value=\"{note}\">\n",
        song = escape_html(&view.song),
        note = escape_html(&view.note),
    );
    if let Some(error) = view.error {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", escape_html(error));
    }
    let _ = write!(
        body,
        "<div class=\"btn-row\">\n<button type=\"submit\" name=\"action\" value=\"normal\"{disabled}>{send_label}</button>\n"
    );
    if config.priority.enabled {
        let _ = write!(
            body,
            "<button type=\"submit\" name=\"action\" value=\"priority\" class=\"btn-upnext\"{disabled}>{label}</button>\n",
            label = escape_html(PRIORITY_LABEL),
        );
    }
    body.push_str("</div>\n</form>\n</div>\n</main>\n");
    let _ = writeln!(
        body,
        "<script>({SUBMIT_SCRIPT})({label});</script>",
        label = serde_json::Value::from(SENDING_LABEL),
    );

    if view.dialog_open {
        let _ = write!(
            body,
            "<div id=\"priority-dialog\" class=\"modal-overlay\">\n<div class=\"modal\">\n\
             <p>e-transfer <strong>{price}</strong> to</p>\n<p class=\"email\">{contact}</p>\n\
             <p>and I'll play it next</p>\n\
             <form method=\"post\" action=\"{DISMISS_PATH}\">\
             <input type=\"hidden\" name=\"form_id\" value=\"{form_id}\">\
             <input type=\"hidden\" name=\"target\" value=\"dialog\">\
             <button type=\"submit\">Got it</button></form>\n</div>\n</div>\n\
             <script>{DIALOG_SCRIPT}</script>\n",
            price = escape_html(&config.priority.price),
            contact = escape_html(&config.priority.contact),
        );
    }

    if view.sent {
        // Mirrors the form's own revert timer
        let _ = write!(
            body,
            "<script>setTimeout(function () {{ document.getElementById('sent').hidden = true; \
             document.getElementById('request-form').hidden = false; }}, {});</script>\n",
            config.sent_banner_delay().as_millis()
        );
    }

    layout(&config.board.title, &body)
}
