//! HTML for the admin surface and the provisioning portal.

use swarm_runtime::{ScanEntry, StatusReport};

const STYLE: &str = "body{font-family:sans-serif;background:#f4f7f9;text-align:center;padding:10px}\
.card{background:#fff;padding:20px;border-radius:15px;box-shadow:0 4px 10px rgba(0,0,0,.1);max-width:420px;margin:auto}\
.btn{display:block;padding:12px;background:#1a73e8;color:#fff;text-decoration:none;border-radius:8px;margin:10px 0;font-weight:bold}\
.mesh{text-align:left;font-size:.85em;background:#eee;padding:10px;border-radius:8px;margin:15px 0;border-left:4px solid #1a73e8}\
table{margin:auto;border-collapse:collapse}td{padding:4px 8px;border:1px solid #ccc}";

/// Escape text for HTML element and attribute content.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset='UTF-8'>\
<meta name='viewport' content='width=device-width, initial-scale=1'>\
<title>{title}</title><style>{STYLE}</style></head>\
<body><div class='card'>{body}</div></body></html>",
        title = escape(title),
    )
}

pub fn status(report: &StatusReport) -> String {
    let link = match (report.online, &report.ssid) {
        (true, Some(ssid)) => format!("online via <b>{}</b>", escape(ssid)),
        (true, None) => "online".to_string(),
        _ => "offline".to_string(),
    };
    let peers = if report.peers.is_empty() {
        "<li>no peers reachable</li>".to_string()
    } else {
        report
            .peers
            .iter()
            .map(|p| format!("<li>{}</li>", escape(p)))
            .collect()
    };
    let mesh = if report.mesh_active { "active" } else { "inactive" };

    let body = format!(
        "<h1>Swarm Admin</h1>\
<p>Config version <b>v{version}</b> &middot; {networks} stored networks</p>\
<p>{role} node, {link}, up {uptime} min</p>\
<div class='mesh'><b>Mesh {mesh}</b> (node {node}, sync {phase})<ul>{peers}</ul></div>\
<a href='/scan' class='btn' style='background:#34a853'>Scan Wi-Fi</a>\
<a href='/view' class='btn'>Manage networks</a>\
<a href='/blink' class='btn' style='background:#fbbc04;color:#000'>Find all (blink)</a>\
<a href='/reboot' class='btn' style='background:#ea4335'>Reboot</a>",
        version = report.version,
        networks = report.networks.len(),
        role = report.role,
        uptime = report.uptime_secs / 60,
        node = escape(&report.node_id),
        phase = report.sync_phase,
    );
    page("Swarm Admin", &body)
}

pub fn scan(entries: &[ScanEntry]) -> String {
    let rows: String = entries
        .iter()
        .map(|e| {
            let ssid = escape(&e.ssid);
            format!(
                "<tr><td>{ssid}</td><td>{signal}%</td><td>\
<form action='/add' method='POST'><input type='hidden' name='s' value='{ssid}'>\
<input type='password' name='p'><input type='submit' value='Add'></form></td></tr>",
                signal = e.signal,
            )
        })
        .collect();
    let body = if entries.is_empty() {
        "<h2>Scan</h2><p>No networks found.</p><a href='/'>Back</a>".to_string()
    } else {
        format!("<h2>Scan</h2><table>{rows}</table><br><a href='/'>Back</a>")
    };
    page("Scan", &body)
}

pub fn networks(report: &StatusReport) -> String {
    let items: String = report
        .networks
        .iter()
        .enumerate()
        .map(|(i, ssid)| format!("<li>{} <a href='/delete?id={i}'>[Del]</a></li>", escape(ssid)))
        .collect();
    let body = format!(
        "<h2>Networks</h2><p>Version v{}</p><ul style='text-align:left'>{items}</ul><a href='/'>Back</a>",
        report.version
    );
    page("Networks", &body)
}

pub fn rebooting() -> String {
    page("Rebooting", "<h2>Rebooting...</h2><p>The node restarts now.</p>")
}

pub fn error(message: &str) -> String {
    page(
        "Error",
        &format!("<h2>Error</h2><p>{}</p><a href='/'>Back</a>", escape(message)),
    )
}

pub fn portal_form(ap_name: &str) -> String {
    let body = format!(
        "<h1>{}</h1><p>Enter the Wi-Fi network this swarm should use.</p>\
<form action='/' method='POST'>\
<p><input name='s' placeholder='SSID' required></p>\
<p><input type='password' name='p' placeholder='Password'></p>\
<p><input type='submit' class='btn' value='Save'></p></form>",
        escape(ap_name)
    );
    page(ap_name, &body)
}

pub fn portal_saved(ssid: &str) -> String {
    page(
        "Saved",
        &format!("<h2>Saved</h2><p>Connecting to <b>{}</b>...</p>", escape(ssid)),
    )
}
